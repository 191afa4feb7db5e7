use super::ApiClient;
use crate::error::ApiResult;
use crate::models::{Favourite, FavouriteIn};

impl ApiClient {
    pub async fn fetch_favourites(&self) -> ApiResult<Vec<Favourite>> {
        self.get("/favourites/").await
    }

    pub async fn create_favourite(&self, input: &FavouriteIn) -> ApiResult<Favourite> {
        let saved: Favourite = self.post("/favourites/", input).await?;
        tracing::info!(id = %saved.id, name = %saved.name, "Favourite created");
        Ok(saved)
    }

    pub async fn remove_favourite(&self, id: &str) -> ApiResult<()> {
        self.delete(&format!("/favourites/{}", urlencoding::encode(id)))
            .await?;
        tracing::info!(id = %id, "Favourite removed");
        Ok(())
    }
}
