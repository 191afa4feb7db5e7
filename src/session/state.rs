use serde::Serialize;
use std::fmt;

/// Lifecycle of the client session
///
/// `Anonymous → Authenticating → Authenticated → (Refreshing) → Authenticated | Anonymous`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Anonymous, Authenticating)
                | (Authenticating, Authenticated)
                | (Authenticating, Anonymous)
                | (Authenticated, Refreshing)
                | (Refreshing, Authenticated)
                // Teardown is always allowed
                | (_, Anonymous)
        )
    }

    /// Requests can carry a credential in these states
    pub fn has_credentials(self) -> bool {
        matches!(self, SessionState::Authenticated | SessionState::Refreshing)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Anonymous => "anonymous",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated => "authenticated",
            SessionState::Refreshing => "refreshing",
        };
        f.write_str(s)
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// User asked to log out
    LoggedOut,
    /// Refresh was rejected or could not reach the server
    RefreshFailed,
    /// A request was still unauthorized after refresh-and-retry
    Unauthorized,
    /// Stored token could not be used (missing subject or expiry)
    InvalidToken,
    /// Profile of the token subject could not be fetched
    ProfileUnavailable,
}

/// Notifications broadcast on session changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { subject: Option<String> },
    Refreshed,
    LoggedOut,
    /// Session was torn down involuntarily; the user has to log in again
    Expired(EndReason),
}
