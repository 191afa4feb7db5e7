use async_trait::async_trait;

use super::collection::{Collection, CollectionQuery};
use crate::cache::QueryKey;
use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{Alert, AlertIn};

/// Threshold alert rules
#[derive(Debug, Clone, Copy, Default)]
pub struct Alerts;

#[async_trait]
impl Collection for Alerts {
    type Item = Alert;
    type Input = AlertIn;

    fn name(&self) -> &'static str {
        "alerts"
    }

    fn key(&self) -> QueryKey {
        QueryKey::Alerts
    }

    async fn list(&self, client: &ApiClient) -> ApiResult<Vec<Alert>> {
        client.fetch_alerts().await
    }

    async fn create(&self, client: &ApiClient, input: &AlertIn) -> ApiResult<Alert> {
        client.create_alert(input).await
    }

    async fn remove(&self, client: &ApiClient, id: &str) -> ApiResult<()> {
        client.remove_alert(id).await
    }

    fn placeholder(&self, input: &AlertIn, temp_id: String) -> Alert {
        Alert::placeholder(input, temp_id)
    }
}

pub type AlertsQuery = CollectionQuery<Alerts>;
