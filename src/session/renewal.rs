//! Proactive token renewal
//!
//! A background task that renews the access token at half of its remaining
//! lifetime, never sooner than [`MIN_RENEWAL_DELAY`]. Session events
//! reschedule it: new tokens restart the countdown, logout parks the task
//! until the next login.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::{EndReason, SessionManager, SessionState};
use crate::error::ApiResult;

/// Lower bound between two proactive renewals
pub const MIN_RENEWAL_DELAY: Duration = Duration::from_secs(5);

/// Something that can exchange the refresh token for a new pair
#[async_trait]
pub trait TokenRenewer: Send + Sync {
    async fn renew(&self) -> ApiResult<()>;
}

/// Half of the remaining lifetime, clamped to `min`
pub fn renewal_delay(exp: i64, now: DateTime<Utc>, min: Duration) -> Duration {
    let remaining_ms = exp.saturating_mul(1000) - now.timestamp_millis();
    let half = u64::try_from(remaining_ms / 2).unwrap_or(0);
    Duration::from_millis(half).max(min)
}

/// Background renewal loop for one session
pub struct RenewalScheduler {
    session: Arc<SessionManager>,
    renewer: Arc<dyn TokenRenewer>,
    min_delay: Duration,
}

impl RenewalScheduler {
    pub fn new(session: Arc<SessionManager>, renewer: Arc<dyn TokenRenewer>) -> Self {
        Self {
            session,
            renewer,
            min_delay: MIN_RENEWAL_DELAY,
        }
    }

    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        // Subscribe before the first snapshot so no event slips between them
        let mut events = self.session.subscribe();

        loop {
            let snapshot = self.session.snapshot().await;

            if snapshot.state != SessionState::Authenticated || snapshot.tokens.is_none() {
                match events.recv().await {
                    Err(RecvError::Closed) => return,
                    _ => continue,
                }
            }

            let Some(exp) = snapshot.claims.and_then(|c| c.exp) else {
                tracing::warn!("Access token carries no expiry, ending session");
                self.session.end(EndReason::InvalidToken).await;
                continue;
            };

            let delay = renewal_delay(exp, Utc::now(), self.min_delay);
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Token renewal scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    match self.renewer.renew().await {
                        Ok(()) => tracing::debug!("Proactive token renewal done"),
                        Err(e) => tracing::warn!(error = %e, "Proactive token renewal failed"),
                    }
                }
                event = events.recv() => {
                    if let Err(RecvError::Closed) = event {
                        return;
                    }
                }
            }
        }
    }
}
