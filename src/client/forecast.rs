use super::{ApiClient, ApiRequest};
use crate::error::{ApiError, ApiResult};
use crate::models::{ForecastParams, ForecastPoint};

impl ApiClient {
    /// `GET /forecast/{metric}?horizon&model`
    pub async fn fetch_forecast(&self, params: &ForecastParams) -> ApiResult<Vec<ForecastPoint>> {
        params.validate().map_err(ApiError::InvalidRequest)?;

        let request = ApiRequest::get(format!("/forecast/{}", urlencoding::encode(&params.metric)))
            .query("horizon", params.horizon)
            .query("model", params.model);

        let points: Vec<ForecastPoint> = self.send_json(request).await?;
        tracing::debug!(
            metric = %params.metric,
            model = %params.model,
            count = points.len(),
            "Fetched forecast"
        );
        Ok(points)
    }
}
