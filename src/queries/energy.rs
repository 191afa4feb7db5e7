//! Energy readings: interval polling with a freshness window

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::{QueryCache, QueryKey};
use crate::client::ApiClient;
use crate::config::PollingConfig;
use crate::error::ApiResult;
use crate::models::EnergyRow;

/// Shared, immutable list of readings
pub type Readings = Arc<Vec<EnergyRow>>;

/// What the poller publishes after every attempt
#[derive(Debug, Clone, Default)]
pub struct EnergyState {
    pub data: Option<Readings>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EnergyState {
    /// Most recent reading, if any
    pub fn latest(&self) -> Option<&EnergyRow> {
        self.data.as_ref().and_then(|rows| rows.last())
    }
}

/// Cached, polling read of `GET /energy/`
pub struct EnergyQuery {
    client: Arc<ApiClient>,
    cache: Arc<QueryCache>,
    stale_time: Duration,
    refetch_interval: Duration,
}

impl EnergyQuery {
    pub fn new(client: Arc<ApiClient>, cache: Arc<QueryCache>, config: &PollingConfig) -> Self {
        Self {
            client,
            cache,
            stale_time: Duration::from_secs(config.energy_stale_secs),
            refetch_interval: Duration::from_secs(config.energy_refetch_interval_secs),
        }
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    pub fn refetch_interval(&self) -> Duration {
        self.refetch_interval
    }

    /// Readings from the cache while fresh, from the server otherwise
    pub async fn fetch(&self) -> ApiResult<Readings> {
        if self.cache.is_fresh(&QueryKey::Energy, self.stale_time) {
            if let Some(rows) = self.cached() {
                tracing::trace!("Energy readings served from cache");
                return Ok(rows);
            }
        }
        self.refetch().await
    }

    /// Always hit the server and update the cache
    pub async fn refetch(&self) -> ApiResult<Readings> {
        let rows: Readings = Arc::new(self.client.fetch_energy().await?);
        self.cache.set(QueryKey::Energy, rows.clone());
        Ok(rows)
    }

    pub fn cached(&self) -> Option<Readings> {
        self.cache.get::<Readings>(&QueryKey::Energy)
    }

    /// Poll on the refetch interval until every receiver is dropped
    pub fn spawn_polling(self: Arc<Self>) -> (JoinHandle<()>, watch::Receiver<EnergyState>) {
        let initial = EnergyState {
            data: self.cached(),
            is_loading: true,
            ..Default::default()
        };
        let (tx, rx) = watch::channel(initial);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.refetch_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                // Only an empty state shows loading; refreshes keep the old data visible
                tx.send_if_modified(|state| {
                    let loading = state.data.is_none();
                    let changed = state.is_loading != loading;
                    state.is_loading = loading;
                    changed
                });
                let result = self.fetch().await;

                let mut next = tx.borrow().clone();
                next.is_loading = false;
                match result {
                    Ok(rows) => {
                        tracing::debug!(count = rows.len(), "Energy poll");
                        next.data = Some(rows);
                        next.error = None;
                        next.updated_at = Some(Utc::now());
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Energy poll failed");
                        next.error = Some(e.to_string());
                    }
                }

                if tx.send(next).is_err() {
                    tracing::debug!("No energy subscribers left, stopping poller");
                    return;
                }
            }
        });

        (handle, rx)
    }
}
