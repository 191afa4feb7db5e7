//! Shared client context
//!
//! One [`Dashboard`] per process: a session, the API client bound to it, the
//! query cache and the queries built on top, and the alert evaluator.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::alerting::{AlertEvaluator, TriggeredAlert};
use crate::cache::QueryCache;
use crate::client::{ApiClient, AuthService};
use crate::config::Config;
use crate::error::ApiResult;
use crate::models::{Alert, EnergyRow, ForecastParams};
use crate::queries::{Alerts, AlertsQuery, EnergyQuery, Favourites, FavouritesQuery, ForecastQuery};
use crate::session::{RenewalScheduler, SessionEvent, SessionManager, SessionStorage, TokenRenewer};

#[derive(Clone)]
pub struct Dashboard {
    pub session: Arc<SessionManager>,
    pub client: Arc<ApiClient>,
    pub auth: AuthService,
    pub cache: Arc<QueryCache>,
    pub energy: Arc<EnergyQuery>,
    pub favourites: Arc<FavouritesQuery>,
    pub alerts: Arc<AlertsQuery>,
    pub forecast: Arc<ForecastQuery>,
    evaluator: Arc<Mutex<AlertEvaluator>>,
    config: Arc<Config>,
}

impl Dashboard {
    /// Restore the persisted session and wire everything to it
    pub fn new(config: Config, storage: Arc<dyn SessionStorage>) -> ApiResult<Self> {
        let session = Arc::new(SessionManager::restore(storage)?);
        Self::with_session(config, session)
    }

    pub fn with_session(config: Config, session: Arc<SessionManager>) -> ApiResult<Self> {
        let client = Arc::new(ApiClient::new(&config.api, session.clone())?);
        let cache = Arc::new(QueryCache::new());

        Ok(Self {
            auth: AuthService::new(client.clone()),
            energy: Arc::new(EnergyQuery::new(client.clone(), cache.clone(), &config.polling)),
            favourites: Arc::new(FavouritesQuery::new(Favourites, client.clone(), cache.clone())),
            alerts: Arc::new(AlertsQuery::new(Alerts, client.clone(), cache.clone())),
            forecast: Arc::new(ForecastQuery::new(client.clone(), cache.clone())),
            evaluator: Arc::new(Mutex::new(AlertEvaluator::new())),
            config: Arc::new(config),
            session,
            client,
            cache,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Forecast request from the `[forecast]` section
    pub fn forecast_params(&self) -> ForecastParams {
        let forecast = &self.config.forecast;
        ForecastParams::new(forecast.metric.clone())
            .horizon(forecast.horizon)
            .model(forecast.model)
    }

    /// End the session and forget everything cached for the user
    pub async fn logout(&self) {
        self.auth.logout().await;
        self.reset_user_state();
    }

    /// Clear per-user caches and re-arm every alert rule
    pub fn reset_user_state(&self) {
        self.cache.clear();
        self.evaluator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .reset();
    }

    pub fn evaluate(&self, alerts: &[Alert], reading: &EnergyRow) -> Vec<TriggeredAlert> {
        self.evaluator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .evaluate(alerts, reading)
    }

    /// Evaluate the current rules against the latest reading
    pub async fn check_alerts(&self) -> ApiResult<Vec<TriggeredAlert>> {
        let alerts = self.alerts.list().await?;
        let readings = self.energy.fetch().await?;
        Ok(match readings.last() {
            Some(latest) => self.evaluate(&alerts, latest),
            None => Vec::new(),
        })
    }

    /// Alerts fired since the last logout
    pub fn triggered(&self) -> Vec<TriggeredAlert> {
        self.evaluator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .triggered()
            .to_vec()
    }

    /// Proactive token renewal for this session
    pub fn spawn_renewal(&self) -> JoinHandle<()> {
        let renewer: Arc<dyn TokenRenewer> = self.client.clone();
        RenewalScheduler::new(self.session.clone(), renewer)
            .min_delay(Duration::from_secs(self.config.session.min_renewal_delay_secs))
            .spawn()
    }

    /// Reset user state whenever the session ends, however it ends
    pub fn spawn_session_listener(&self) -> JoinHandle<()> {
        let mut events = self.session.subscribe();
        let dashboard = self.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::LoggedOut) | Ok(SessionEvent::Expired(_)) => {
                        dashboard.reset_user_state();
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Session listener lagged");
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use crate::session::MemoryStorage;

    fn dashboard() -> Dashboard {
        Dashboard::new(Config::default(), Arc::new(MemoryStorage::new())).unwrap()
    }

    #[tokio::test]
    async fn test_logout_rearms_alerts_and_clears_cache() {
        let dash = dashboard();
        let reading: EnergyRow = serde_json::from_value(serde_json::json!({
            "id": "r1", "timestamp": "2024-05-01T12:00:00",
            "consumption_kwh": 5200, "production_kwh": 0, "nuclear_kwh": 0,
            "wind_kwh": 0, "hydroelectric_kwh": 0, "oil_and_gas_kwh": 0,
            "coal_kwh": 0, "solar_kwh": 0, "biomass_kwh": 0
        }))
        .unwrap();
        let alerts = vec![Alert {
            id: "a1".into(),
            metric: "consumption_kwh".into(),
            threshold: 5000.0,
            direction: Direction::Above,
            created_at: None,
        }];

        assert_eq!(dash.evaluate(&alerts, &reading).len(), 1);
        assert!(dash.evaluate(&alerts, &reading).is_empty());
        dash.cache.set(crate::cache::QueryKey::Alerts, alerts.clone());

        dash.logout().await;
        assert!(dash.cache.is_empty());
        assert!(dash.triggered().is_empty());
        assert_eq!(dash.evaluate(&alerts, &reading).len(), 1);
    }

    #[test]
    fn test_forecast_params_from_config() {
        let params = dashboard().forecast_params();
        assert_eq!(params.metric, "Demand");
        assert_eq!(params.horizon, 48);
        assert!(params.validate().is_ok());
    }
}
