//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::ForecastModel;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Energy API connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Where tokens are persisted and how early they are renewed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    #[serde(default = "default_min_renewal_delay")]
    pub min_renewal_delay_secs: u64,
}

fn default_storage_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("energy-dash").to_string_lossy().to_string())
        .unwrap_or_else(|| "./energy_dash_session".to_string())
}

fn default_min_renewal_delay() -> u64 {
    5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            min_renewal_delay_secs: default_min_renewal_delay(),
        }
    }
}

impl SessionConfig {
    /// `storage_dir` with a leading `~` expanded
    pub fn storage_path(&self) -> PathBuf {
        match self.storage_dir.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.storage_dir)),
            None => PathBuf::from(&self.storage_dir),
        }
    }
}

/// Energy polling cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_refetch_interval")]
    pub energy_refetch_interval_secs: u64,

    #[serde(default = "default_stale_time")]
    pub energy_stale_secs: u64,
}

fn default_refetch_interval() -> u64 {
    300 // 5 minutes
}

fn default_stale_time() -> u64 {
    55
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            energy_refetch_interval_secs: default_refetch_interval(),
            energy_stale_secs: default_stale_time(),
        }
    }
}

/// Forecast shown alongside the day chart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_forecast_metric")]
    pub metric: String,

    #[serde(default = "default_forecast_horizon")]
    pub horizon: u32,

    #[serde(default = "default_forecast_model")]
    pub model: ForecastModel,
}

fn default_forecast_metric() -> String {
    "Demand".to_string()
}

fn default_forecast_horizon() -> u32 {
    48
}

fn default_forecast_model() -> ForecastModel {
    ForecastModel::Prophet
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            metric: default_forecast_metric(),
            horizon: default_forecast_horizon(),
            model: default_forecast_model(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `explicit`, else the default locations, else the environment
    ///
    /// An explicit path must exist and parse; broken files at the default
    /// locations are skipped with a warning.
    pub fn load_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_with_env(path)?;
            tracing::info!("Loaded config from {:?}", path);
            return Ok(config);
        }

        let config_paths = [
            dirs::config_dir().map(|p| p.join("energy-dash").join("config.toml")),
            Some(PathBuf::from("/etc/energy-dash/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Ok(Self::from_env())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("ENERGY_DASH_API_URL") {
            self.api.base_url = url;
        }
        if let Some(dir) = var("ENERGY_DASH_SESSION_DIR") {
            self.session.storage_dir = dir;
        }
        if let Some(level) = var("ENERGY_DASH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("ENERGY_DASH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# energy-dash configuration
#
# Environment variables override these settings:
# - ENERGY_DASH_API_URL
# - ENERGY_DASH_SESSION_DIR
# - ENERGY_DASH_LOG_LEVEL
# - ENERGY_DASH_LOG_FORMAT

[api]
# Base URL of the energy API
base_url = "http://localhost:8000"

# Request timeout in seconds
request_timeout_secs = 30

[session]
# Directory holding session.json and user.json
storage_dir = "~/.local/share/energy-dash"

# Lower bound for the proactive token renewal delay (seconds)
min_renewal_delay_secs = 5

[polling]
# How often `watch` refetches energy readings (seconds)
energy_refetch_interval_secs = 300

# Readings younger than this are served from the cache (seconds)
energy_stale_secs = 55

[forecast]
# Metric, horizon (hours, at most 336) and model: hw, prophet, xgb, lgbm
metric = "Demand"
horizon = 48
model = "prophet"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/energy-dash/energy-dash.log"
"#
    .to_string()
}
