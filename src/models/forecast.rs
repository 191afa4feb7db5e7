use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest horizon (hours) the forecast endpoint accepts
pub const MAX_HORIZON: u32 = 336;

/// Forecasting backend selected on the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastModel {
    /// Holt-Winters
    #[default]
    Hw,
    Prophet,
    Xgb,
    Lgbm,
}

impl ForecastModel {
    pub fn as_str(self) -> &'static str {
        match self {
            ForecastModel::Hw => "hw",
            ForecastModel::Prophet => "prophet",
            ForecastModel::Xgb => "xgb",
            ForecastModel::Lgbm => "lgbm",
        }
    }
}

impl fmt::Display for ForecastModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hw" => Ok(ForecastModel::Hw),
            "prophet" => Ok(ForecastModel::Prophet),
            "xgb" => Ok(ForecastModel::Xgb),
            "lgbm" => Ok(ForecastModel::Lgbm),
            other => Err(format!("unknown forecast model '{other}'")),
        }
    }
}

/// Parameter tuple of a forecast request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForecastParams {
    pub metric: String,
    pub horizon: u32,
    pub model: ForecastModel,
}

impl ForecastParams {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            horizon: 24,
            model: ForecastModel::default(),
        }
    }

    pub fn horizon(mut self, horizon: u32) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn model(mut self, model: ForecastModel) -> Self {
        self.model = model;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.metric.trim().is_empty() {
            return Err("forecast metric must not be empty".to_string());
        }
        if self.horizon == 0 || self.horizon > MAX_HORIZON {
            return Err(format!(
                "forecast horizon must be between 1 and {MAX_HORIZON}, got {}",
                self.horizon
            ));
        }
        Ok(())
    }
}

/// One forecast sample; the API encodes it as a `[timestamp, value]` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint(pub String, pub f64);

impl ForecastPoint {
    pub fn timestamp(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> f64 {
        self.1
    }
}
