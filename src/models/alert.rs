use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{de, Identified};

/// Which side of the threshold triggers an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
}

impl Direction {
    /// Strict comparison: a value equal to the threshold never crosses it
    pub fn crosses(self, value: f64, threshold: f64) -> bool {
        match self {
            Direction::Above => value > threshold,
            Direction::Below => value < threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "above" => Ok(Direction::Above),
            "below" => Ok(Direction::Below),
            other => Err(format!("unknown direction '{other}', expected above or below")),
        }
    }
}

/// Body of `POST /alerts/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertIn {
    pub metric: String,
    pub threshold: f64,
    pub direction: Direction,
}

/// A metric/threshold/direction rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub metric: String,
    #[serde(deserialize_with = "de::decimal")]
    pub threshold: f64,
    pub direction: Direction,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Alert {
    pub fn placeholder(input: &AlertIn, temp_id: String) -> Self {
        Self {
            id: temp_id,
            metric: input.metric.clone(),
            threshold: input.threshold,
            direction: input.direction,
            created_at: None,
        }
    }
}

impl Identified for Alert {
    fn id(&self) -> &str {
        &self.id
    }
}
