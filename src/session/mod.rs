//! Session Store
//!
//! Holds the access/refresh token pair and the decoded identity, drives the
//! session state machine, persists state through a [`SessionStorage`]
//! backend and broadcasts [`SessionEvent`]s to interested tasks.
//!
//! The manager never talks to the network itself. Login, refresh and
//! profile calls live in [`crate::client`]; they report their outcome here.

mod renewal;
mod state;
mod storage;
mod token;

pub use renewal::{renewal_delay, RenewalScheduler, TokenRenewer, MIN_RENEWAL_DELAY};
pub use state::{EndReason, SessionEvent, SessionState};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};
pub use token::{decode_claims, AccessClaims};

#[cfg(test)]
pub(crate) use token::encode_unsigned;

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::models::{TokenPair, UserProfile};

/// Session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("Malformed access token: {0}")]
    MalformedToken(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Point-in-time copy of the session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub tokens: Option<TokenPair>,
    pub claims: Option<AccessClaims>,
    pub user: Option<UserProfile>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.state.has_credentials() && self.tokens.is_some()
    }
}

struct SessionInner {
    state: SessionState,
    tokens: Option<TokenPair>,
    claims: Option<AccessClaims>,
    user: Option<UserProfile>,
}

impl SessionInner {
    fn anonymous() -> Self {
        Self {
            state: SessionState::Anonymous,
            tokens: None,
            claims: None,
            user: None,
        }
    }

    fn check(&self, next: SessionState) -> Result<(), SessionError> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            })
        }
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        self.check(next)?;
        tracing::debug!(from = %self.state, to = %next, "Session transition");
        self.state = next;
        Ok(())
    }
}

/// Owner of the client session
pub struct SessionManager {
    inner: RwLock<SessionInner>,
    storage: Arc<dyn SessionStorage>,
    events: broadcast::Sender<SessionEvent>,
    refresh_lock: Mutex<()>,
}

impl SessionManager {
    /// Start with an empty session
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self::with_inner(storage, SessionInner::anonymous())
    }

    fn with_inner(storage: Arc<dyn SessionStorage>, inner: SessionInner) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            inner: RwLock::new(inner),
            storage,
            events,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Rebuild the session from storage
    ///
    /// Stored tokens that cannot be decoded are discarded and the session
    /// starts anonymous.
    pub fn restore(storage: Arc<dyn SessionStorage>) -> Result<Self, SessionError> {
        let Some(tokens) = storage.load_tokens()? else {
            return Ok(Self::new(storage));
        };

        let claims = match decode_claims(&tokens.access_token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding stored session");
                storage.clear()?;
                return Ok(Self::new(storage));
            }
        };

        let user = storage.load_user().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring unreadable cached profile");
            None
        });

        tracing::info!(subject = ?claims.sub, "Restored stored session");
        let inner = SessionInner {
            state: SessionState::Authenticated,
            tokens: Some(tokens),
            claims: Some(claims),
            user,
        };
        Ok(Self::with_inner(storage, inner))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read().await;
        SessionSnapshot {
            state: inner.state,
            tokens: inner.tokens.clone(),
            claims: inner.claims.clone(),
            user: inner.user.clone(),
        }
    }

    /// Bearer credential for outgoing requests
    pub async fn access_token(&self) -> Option<String> {
        let inner = self.inner.read().await;
        if !inner.state.has_credentials() {
            return None;
        }
        inner.tokens.as_ref().map(|t| t.access_token.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        let inner = self.inner.read().await;
        inner.tokens.as_ref().map(|t| t.refresh_token.clone())
    }

    pub async fn claims(&self) -> Option<AccessClaims> {
        self.inner.read().await.claims.clone()
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.inner.read().await.user.clone()
    }

    /// `Anonymous → Authenticating`
    pub async fn begin_login(&self) -> Result<(), SessionError> {
        self.inner
            .write()
            .await
            .transition(SessionState::Authenticating)
    }

    /// Login attempt failed, back to `Anonymous`
    pub async fn abort_login(&self) {
        let mut inner = self.inner.write().await;
        if inner.state == SessionState::Authenticating {
            *inner = SessionInner::anonymous();
        }
    }

    /// `Authenticating → Authenticated` with freshly issued tokens
    pub async fn establish(&self, tokens: TokenPair) -> Result<AccessClaims, SessionError> {
        let claims = decode_claims(&tokens.access_token)?;

        let mut inner = self.inner.write().await;
        inner.check(SessionState::Authenticated)?;
        self.storage.save_tokens(&tokens)?;
        inner.transition(SessionState::Authenticated)?;
        inner.tokens = Some(tokens);
        inner.claims = Some(claims.clone());
        drop(inner);

        tracing::info!(subject = ?claims.sub, "Logged in");
        let _ = self.events.send(SessionEvent::LoggedIn {
            subject: claims.sub.clone(),
        });
        Ok(claims)
    }

    /// `Authenticated → Refreshing`, returning the refresh token to present
    pub async fn begin_refresh(&self) -> Result<String, SessionError> {
        let mut inner = self.inner.write().await;
        let refresh = inner
            .tokens
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .ok_or(SessionError::NoRefreshToken)?;
        inner.transition(SessionState::Refreshing)?;
        Ok(refresh)
    }

    /// `Refreshing → Authenticated` with rotated tokens
    pub async fn complete_refresh(&self, tokens: TokenPair) -> Result<AccessClaims, SessionError> {
        let claims = decode_claims(&tokens.access_token)?;

        let mut inner = self.inner.write().await;
        inner.check(SessionState::Authenticated)?;
        self.storage.save_tokens(&tokens)?;
        inner.transition(SessionState::Authenticated)?;
        inner.tokens = Some(tokens);
        inner.claims = Some(claims.clone());
        drop(inner);

        tracing::debug!(expires_at = ?claims.expires_at(), "Tokens rotated");
        let _ = self.events.send(SessionEvent::Refreshed);
        Ok(claims)
    }

    /// Cache the profile of the signed-in user
    pub async fn set_user(&self, user: UserProfile) -> Result<(), SessionError> {
        let mut inner = self.inner.write().await;
        self.storage.save_user(&user)?;
        inner.user = Some(user);
        Ok(())
    }

    /// Tear the session down and clear storage
    pub async fn end(&self, reason: EndReason) {
        let mut inner = self.inner.write().await;
        let was_active = inner.state != SessionState::Anonymous || inner.tokens.is_some();
        *inner = SessionInner::anonymous();
        if let Err(e) = self.storage.clear() {
            tracing::error!(error = %e, "Failed to clear session storage");
        }
        drop(inner);

        if !was_active {
            return;
        }

        let event = match reason {
            EndReason::LoggedOut => {
                tracing::info!("Logged out");
                SessionEvent::LoggedOut
            }
            other => {
                tracing::warn!(reason = ?other, "Session ended");
                SessionEvent::Expired(other)
            }
        };
        let _ = self.events.send(event);
    }

    /// Serialises token refreshes across concurrent requests
    pub(crate) fn refresh_lock(&self) -> &Mutex<()> {
        &self.refresh_lock
    }
}
