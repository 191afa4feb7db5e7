use super::ApiClient;
use crate::error::ApiResult;
use crate::models::EnergyRow;

impl ApiClient {
    /// All energy readings visible to the user, oldest first
    pub async fn fetch_energy(&self) -> ApiResult<Vec<EnergyRow>> {
        let mut rows: Vec<EnergyRow> = self.get("/energy/").await?;
        rows.sort_by_key(|r| r.timestamp);
        tracing::debug!(count = rows.len(), "Fetched energy readings");
        Ok(rows)
    }
}
