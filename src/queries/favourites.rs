use async_trait::async_trait;

use super::collection::{Collection, CollectionQuery};
use crate::cache::QueryKey;
use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{Favourite, FavouriteIn};

/// Saved dashboard views
#[derive(Debug, Clone, Copy, Default)]
pub struct Favourites;

#[async_trait]
impl Collection for Favourites {
    type Item = Favourite;
    type Input = FavouriteIn;

    fn name(&self) -> &'static str {
        "favourites"
    }

    fn key(&self) -> QueryKey {
        QueryKey::Favourites
    }

    async fn list(&self, client: &ApiClient) -> ApiResult<Vec<Favourite>> {
        client.fetch_favourites().await
    }

    async fn create(&self, client: &ApiClient, input: &FavouriteIn) -> ApiResult<Favourite> {
        client.create_favourite(input).await
    }

    async fn remove(&self, client: &ApiClient, id: &str) -> ApiResult<()> {
        client.remove_favourite(id).await
    }

    fn placeholder(&self, input: &FavouriteIn, temp_id: String) -> Favourite {
        Favourite::placeholder(input, temp_id)
    }
}

pub type FavouritesQuery = CollectionQuery<Favourites>;
