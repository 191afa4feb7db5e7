//! Query Cache
//!
//! Keyed store for server-owned data. Entries remember when they were
//! written and whether they were invalidated, which is all the query layer
//! needs to decide between serving cached data and refetching.
//!
//! The cache is only ever mutated through its own operations; locks are held
//! for the duration of a single call and never across an `.await`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::models::ForecastModel;

/// Identity of a cached query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Energy,
    Favourites,
    Alerts,
    Forecast {
        metric: String,
        horizon: u32,
        model: ForecastModel,
    },
}

struct CacheEntry {
    data: Arc<dyn Any + Send + Sync>,
    updated_at: Instant,
    invalidated: bool,
}

/// Point-in-time status of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStatus {
    pub age: Duration,
    pub invalidated: bool,
}

/// Shared keyed cache
#[derive(Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached data for `key`, if present and of type `T`
    pub fn get<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .and_then(|entry| entry.data.downcast_ref::<T>())
            .cloned()
    }

    /// Replace the data for `key` and mark it fresh
    pub fn set<T>(&self, key: QueryKey, data: T)
    where
        T: Send + Sync + 'static,
    {
        let entry = CacheEntry {
            data: Arc::new(data),
            updated_at: Instant::now(),
            invalidated: false,
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, entry);
    }

    /// Apply `f` to the current data and store the result
    ///
    /// `f` receives `None` when the key is empty or holds another type.
    /// The entry keeps its invalidation flag; the timestamp is renewed.
    pub fn update<T, F>(&self, key: QueryKey, f: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Option<T>) -> T,
    {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let (current, invalidated) = match entries.get(&key) {
            Some(entry) => (entry.data.downcast_ref::<T>().cloned(), entry.invalidated),
            None => (None, false),
        };

        let next = f(current);
        entries.insert(
            key,
            CacheEntry {
                data: Arc::new(next.clone()),
                updated_at: Instant::now(),
                invalidated,
            },
        );
        next
    }

    /// Mark `key` stale so the next read refetches; data stays readable
    pub fn invalidate(&self, key: &QueryKey) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(key) {
            entry.invalidated = true;
        }
    }

    /// True when `key` holds data younger than `stale_time` that was not invalidated
    pub fn is_fresh(&self, key: &QueryKey, stale_time: Duration) -> bool {
        self.status(key)
            .is_some_and(|s| !s.invalidated && s.age < stale_time)
    }

    pub fn status(&self, key: &QueryKey) -> Option<EntryStatus> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).map(|entry| EntryStatus {
            age: entry.updated_at.elapsed(),
            invalidated: entry.invalidated,
        })
    }

    pub fn remove(&self, key: &QueryKey) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    /// Drop everything, e.g. when the user changes
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
