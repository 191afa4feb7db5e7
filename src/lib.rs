//! # energy-dash
//!
//! Client library for the renewable-energy dashboard API: keeps a session
//! alive, caches and polls server data, applies optimistic edits to
//! favourites and alerts, and evaluates alert rules against fresh readings.
//!
//! ## Modules
//!
//! - [`session`]: token pair, session state machine, persistence and renewal
//! - [`client`]: HTTP client with refresh-once 401 recovery and typed endpoints
//! - [`cache`] / [`queries`]: keyed cache and the queries built on it
//! - [`alerting`]: once-per-session alert evaluation
//! - [`dashboard`]: chart shaping, saved views and the shared [`Dashboard`] context
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use energy_dash::{Config, Dashboard, FileStorage};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let storage = Arc::new(FileStorage::new(config.session.storage_path()));
//!     let dash = Dashboard::new(config, storage)?;
//!
//!     dash.auth.login("a@x.com", "pw").await?;
//!     let profile = dash.auth.load_profile().await?;
//!     println!("Hello {}", profile.display_name());
//!
//!     let readings = dash.energy.fetch().await?;
//!     for hit in dash.check_alerts().await? {
//!         println!("{hit}");
//!     }
//!     println!("{} readings", readings.len());
//!     Ok(())
//! }
//! ```

pub mod alerting;
pub mod cache;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod models;
pub mod queries;
pub mod session;

pub use alerting::{AlertEvaluator, TriggeredAlert};
pub use cache::{QueryCache, QueryKey};
pub use client::{ApiClient, AuthService};
pub use config::Config;
pub use dashboard::Dashboard;
pub use error::{ApiError, ApiResult};
pub use session::{FileStorage, MemoryStorage, SessionManager, SessionState};
