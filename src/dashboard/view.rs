use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ApiResult;
use crate::models::{Favourite, FavouriteIn};
use crate::queries::FavouritesQuery;

/// Label the forecast series is drawn under
pub const DEFAULT_FORECAST_LABEL: &str = "Total Consumption";

/// What a favourite stores in `config_json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSignature {
    /// `YYYY-MM-DD`
    pub day: String,
    /// Hidden series names, sorted
    pub hidden: Vec<String>,
    #[serde(rename = "fcMetric")]
    pub fc_metric: String,
}

impl ViewSignature {
    pub fn new(day: NaiveDate, hidden: &BTreeSet<String>, fc_metric: impl Into<String>) -> Self {
        Self {
            day: day.format("%Y-%m-%d").to_string(),
            // BTreeSet iterates in order
            hidden: hidden.iter().cloned().collect(),
            fc_metric: fc_metric.into(),
        }
    }

    /// Decode a stored view; `None` if the favourite holds something else
    pub fn from_favourite(favourite: &Favourite) -> Option<Self> {
        serde_json::from_value(favourite.config_json.clone()).ok()
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "day": self.day,
            "hidden": self.hidden,
            "fcMetric": self.fc_metric,
        })
    }

    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.day, "%Y-%m-%d").ok()
    }

    pub fn hidden_set(&self) -> BTreeSet<String> {
        self.hidden.iter().cloned().collect()
    }

    /// Favourite body for this view, named `View MM/DD`
    pub fn to_favourite(&self) -> FavouriteIn {
        let name = match self.date() {
            Some(day) => favourite_name(day),
            None => format!("View {}", self.day),
        };
        FavouriteIn {
            name,
            config_json: self.to_value(),
        }
    }
}

pub fn favourite_name(day: NaiveDate) -> String {
    format!("View {}", day.format("%m/%d"))
}

/// The favourite whose stored config equals `signature`
pub fn find_favourite<'a>(favourites: &'a [Favourite], signature: &ViewSignature) -> Option<&'a Favourite> {
    let wanted = signature.to_value();
    favourites.iter().find(|f| f.config_json == wanted)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Added(Favourite),
    Removed(Favourite),
}

/// Remove the favourite matching `signature`, or save a new one
pub async fn toggle_favourite(
    favourites: &FavouritesQuery,
    signature: &ViewSignature,
) -> ApiResult<ToggleOutcome> {
    let current = favourites.list().await?;
    match find_favourite(&current, signature) {
        Some(existing) => {
            let existing = existing.clone();
            favourites.remove(&existing.id).await?;
            Ok(ToggleOutcome::Removed(existing))
        }
        None => {
            let saved = favourites.add(signature.to_favourite()).await?;
            Ok(ToggleOutcome::Added(saved))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
    }

    #[test]
    fn test_signature_shape() {
        let hidden: BTreeSet<String> = ["Wind", "Biogas"].iter().map(|s| s.to_string()).collect();
        let sig = ViewSignature::new(day(), &hidden, DEFAULT_FORECAST_LABEL);

        assert_eq!(
            sig.to_value(),
            serde_json::json!({
                "day": "2024-05-02",
                "hidden": ["Biogas", "Wind"],
                "fcMetric": "Total Consumption"
            })
        );
        assert_eq!(sig.to_favourite().name, "View 05/02");
        assert_eq!(sig.date(), Some(day()));
    }

    #[test]
    fn test_find_favourite_by_config() {
        let sig = ViewSignature::new(day(), &BTreeSet::new(), DEFAULT_FORECAST_LABEL);
        let other = ViewSignature::new(day().succ_opt().unwrap(), &BTreeSet::new(), DEFAULT_FORECAST_LABEL);
        let favourites = vec![
            Favourite {
                id: "f1".into(),
                name: "View 05/03".into(),
                config_json: other.to_value(),
                created_at: None,
            },
            Favourite {
                id: "f2".into(),
                name: "mine".into(),
                config_json: sig.to_value(),
                created_at: None,
            },
        ];

        assert_eq!(find_favourite(&favourites, &sig).map(|f| f.id.as_str()), Some("f2"));
        assert_eq!(ViewSignature::from_favourite(&favourites[0]), Some(other));

        let hidden: BTreeSet<String> = ["Solar".to_string()].into_iter().collect();
        let miss = ViewSignature::new(day(), &hidden, DEFAULT_FORECAST_LABEL);
        assert!(find_favourite(&favourites, &miss).is_none());
    }
}
