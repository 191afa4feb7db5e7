//! Client Error Types
//!
//! Every fallible client operation returns [`ApiError`]. The variants follow
//! the three failure classes of the remote API (no response, non-2xx
//! response, exhausted authentication) plus the local failures around them.

use thiserror::Error;

use crate::session::{SessionError, StorageError};

/// Errors surfaced by the API client and the query layer
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request was sent but no response came back
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-2xx status
    #[error("API Error: {message}")]
    Server { status: u16, message: String },

    /// Authentication could not be recovered; the session has been torn down
    #[error("Session expired. Please log in again.")]
    SessionExpired,

    /// An authenticated call was made without a session
    #[error("Not logged in")]
    NotAuthenticated,

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Request rejected before it was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Session lifecycle violation
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Session persistence failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// HTTP status carried by a server error
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the caller has to log in again
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::SessionExpired | ApiError::NotAuthenticated)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_timeout() {
            ApiError::Network("request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("No response from server".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// Result type alias for client operations
pub type ApiResult<T> = Result<T, ApiError>;
