//! REST API Client
//!
//! [`ApiClient`] carries the session credential and the 401 recovery; the
//! resource modules add typed endpoint calls on top of it.

mod alerts;
mod auth;
mod energy;
mod favourites;
mod forecast;
mod http;

pub use auth::AuthService;
pub use http::{ApiClient, ApiRequest};
