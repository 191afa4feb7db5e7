//! Forecast: fetched only while enabled, cached per parameter tuple

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::{QueryCache, QueryKey};
use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{ForecastParams, ForecastPoint};

pub struct ForecastQuery {
    client: Arc<ApiClient>,
    cache: Arc<QueryCache>,
    enabled: AtomicBool,
}

impl ForecastQuery {
    /// Starts disabled
    pub fn new(client: Arc<ApiClient>, cache: Arc<QueryCache>) -> Self {
        Self {
            client,
            cache,
            enabled: AtomicBool::new(false),
        }
    }

    pub fn key(params: &ForecastParams) -> QueryKey {
        QueryKey::Forecast {
            metric: params.metric.clone(),
            horizon: params.horizon,
            model: params.model,
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// `None` while disabled; cached points when present, network otherwise
    pub async fn fetch(&self, params: &ForecastParams) -> ApiResult<Option<Vec<ForecastPoint>>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        if let Some(points) = self.cached(params) {
            return Ok(Some(points));
        }
        self.refetch(params).await.map(Some)
    }

    /// Explicit refetch, honoured even while disabled
    pub async fn refetch(&self, params: &ForecastParams) -> ApiResult<Vec<ForecastPoint>> {
        let points = self.client.fetch_forecast(params).await?;
        self.cache.set(Self::key(params), points.clone());
        Ok(points)
    }

    pub fn cached(&self, params: &ForecastParams) -> Option<Vec<ForecastPoint>> {
        self.cache.get::<Vec<ForecastPoint>>(&Self::key(params))
    }
}
