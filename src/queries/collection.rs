//! User-owned collections with optimistic mutations
//!
//! Favourites and alerts share the same lifecycle: the list is fetched on
//! demand and cached; create and delete update the cached list before the
//! server answers, undo that change if the server rejects it, and invalidate
//! the key afterwards so the next read reconciles with the server.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::{QueryCache, QueryKey};
use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::Identified;

/// Prefix of ids given to optimistic placeholders
pub const TEMP_ID_PREFIX: &str = "temp-";

/// A server-owned list with create and delete endpoints
#[async_trait]
pub trait Collection: Send + Sync + 'static {
    type Item: Clone + Identified + Send + Sync + 'static;
    type Input: Send + Sync;

    /// Human-readable name for logs
    fn name(&self) -> &'static str;

    fn key(&self) -> QueryKey;

    async fn list(&self, client: &ApiClient) -> ApiResult<Vec<Self::Item>>;

    async fn create(&self, client: &ApiClient, input: &Self::Input) -> ApiResult<Self::Item>;

    async fn remove(&self, client: &ApiClient, id: &str) -> ApiResult<()>;

    /// Local stand-in displayed while the create call is in flight
    fn placeholder(&self, input: &Self::Input, temp_id: String) -> Self::Item;
}

/// Cached access to one [`Collection`]
pub struct CollectionQuery<C: Collection> {
    resource: C,
    client: Arc<ApiClient>,
    cache: Arc<QueryCache>,
    adding: AtomicUsize,
    removing: AtomicUsize,
}

impl<C: Collection> CollectionQuery<C> {
    pub fn new(resource: C, client: Arc<ApiClient>, cache: Arc<QueryCache>) -> Self {
        Self {
            resource,
            client,
            cache,
            adding: AtomicUsize::new(0),
            removing: AtomicUsize::new(0),
        }
    }

    /// Cached list unless missing or invalidated
    pub async fn list(&self) -> ApiResult<Vec<C::Item>> {
        let key = self.resource.key();
        let invalidated = self.cache.status(&key).map(|s| s.invalidated);
        if invalidated == Some(false) {
            if let Some(items) = self.cached() {
                return Ok(items);
            }
        }
        self.refetch().await
    }

    pub async fn refetch(&self) -> ApiResult<Vec<C::Item>> {
        let items = self.resource.list(&self.client).await?;
        tracing::debug!(collection = self.resource.name(), count = items.len(), "Fetched collection");
        self.cache.set(self.resource.key(), items.clone());
        Ok(items)
    }

    pub fn cached(&self) -> Option<Vec<C::Item>> {
        self.cache.get::<Vec<C::Item>>(&self.resource.key())
    }

    pub fn is_adding(&self) -> bool {
        self.adding.load(Ordering::SeqCst) > 0
    }

    pub fn is_removing(&self) -> bool {
        self.removing.load(Ordering::SeqCst) > 0
    }

    /// Append a placeholder now, swap in the server's entity on success
    pub async fn add(&self, input: C::Input) -> ApiResult<C::Item> {
        let key = self.resource.key();
        let temp_id = format!("{TEMP_ID_PREFIX}{}", uuid::Uuid::new_v4());
        let placeholder = self.resource.placeholder(&input, temp_id.clone());

        let loaded = self.cache.status(&key).is_some();
        self.cache.update(key.clone(), |prev: Option<Vec<C::Item>>| {
            let mut items = prev.unwrap_or_default();
            items.push(placeholder);
            items
        });
        // A list that was never fetched must not be served as complete
        if !loaded {
            self.cache.invalidate(&key);
        }

        self.adding.fetch_add(1, Ordering::SeqCst);
        let result = self.resource.create(&self.client, &input).await;
        self.adding.fetch_sub(1, Ordering::SeqCst);

        match &result {
            Ok(saved) => {
                self.cache.update(key.clone(), |prev: Option<Vec<C::Item>>| {
                    prev.unwrap_or_default()
                        .into_iter()
                        .map(|item| if item.id() == temp_id { saved.clone() } else { item })
                        .collect()
                });
            }
            Err(e) => {
                tracing::warn!(collection = self.resource.name(), error = %e, "Create failed, rolling back");
                self.cache.update(key.clone(), |prev: Option<Vec<C::Item>>| {
                    prev.unwrap_or_default()
                        .into_iter()
                        .filter(|item| item.id() != temp_id)
                        .collect()
                });
            }
        }

        self.cache.invalidate(&key);
        result
    }

    /// Drop the item now, put it back if the server refuses
    pub async fn remove(&self, id: &str) -> ApiResult<()> {
        let key = self.resource.key();
        let mut removed: Option<(usize, C::Item)> = None;

        let loaded = self.cache.status(&key).is_some();
        self.cache.update(key.clone(), |prev: Option<Vec<C::Item>>| {
            let mut items = prev.unwrap_or_default();
            if let Some(pos) = items.iter().position(|item| item.id() == id) {
                removed = Some((pos, items.remove(pos)));
            }
            items
        });
        if !loaded {
            self.cache.invalidate(&key);
        }

        self.removing.fetch_add(1, Ordering::SeqCst);
        let result = self.resource.remove(&self.client, id).await;
        self.removing.fetch_sub(1, Ordering::SeqCst);

        if let Err(e) = &result {
            tracing::warn!(collection = self.resource.name(), id = %id, error = %e, "Delete failed, rolling back");
            if let Some((pos, item)) = removed {
                self.cache.update(key.clone(), |prev: Option<Vec<C::Item>>| {
                    let mut items = prev.unwrap_or_default();
                    if !items.iter().any(|i| i.id() == item.id()) {
                        items.insert(pos.min(items.len()), item);
                    }
                    items
                });
            }
        }

        self.cache.invalidate(&key);
        result
    }
}
