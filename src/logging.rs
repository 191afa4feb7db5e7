//! Tracing subscriber setup
//!
//! Events go to stderr (or the configured file) so command output on stdout
//! stays machine-readable.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to open log file {path:?}: {error}")]
    File {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Filter used when `RUST_LOG` is unset
pub fn default_directive(config: &LoggingConfig) -> String {
    format!("energy_dash={}", config.level)
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));
    let json = config.format.eq_ignore_ascii_case("json");

    let layer: BoxedLayer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|error| LoggingError::File {
                    path: PathBuf::from(path),
                    error,
                })?;
            let fmt = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            if json {
                fmt.json().boxed()
            } else {
                fmt.boxed()
            }
        }
        None => {
            let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if json {
                fmt.json().boxed()
            } else {
                fmt.boxed()
            }
        }
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_scoped_to_crate() {
        let config = LoggingConfig {
            level: "debug".into(),
            ..Default::default()
        };
        assert_eq!(default_directive(&config), "energy_dash=debug");
    }

    #[test]
    fn test_unwritable_log_file() {
        let config = LoggingConfig {
            file: Some("/nonexistent/dir/energy-dash.log".into()),
            ..Default::default()
        };
        assert!(matches!(init(&config), Err(LoggingError::File { .. })));
    }
}
