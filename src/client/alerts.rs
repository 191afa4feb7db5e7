use super::ApiClient;
use crate::error::ApiResult;
use crate::models::{Alert, AlertIn};

impl ApiClient {
    pub async fn fetch_alerts(&self) -> ApiResult<Vec<Alert>> {
        self.get("/alerts/").await
    }

    pub async fn create_alert(&self, input: &AlertIn) -> ApiResult<Alert> {
        let saved: Alert = self.post("/alerts/", input).await?;
        tracing::info!(
            id = %saved.id,
            metric = %saved.metric,
            direction = %saved.direction,
            threshold = saved.threshold,
            "Alert created"
        );
        Ok(saved)
    }

    pub async fn remove_alert(&self, id: &str) -> ApiResult<()> {
        self.delete(&format!("/alerts/{}", urlencoding::encode(id)))
            .await?;
        tracing::info!(id = %id, "Alert removed");
        Ok(())
    }
}
