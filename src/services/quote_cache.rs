use moka::future::Cache;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

const MAX_ENTRIES: u64 = 1000;

/// A value plus whether it was served from the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cached<T> {
    pub value: T,
    pub cached: bool,
}

/// Process-local key/value store whose entries go stale after a fixed window.
///
/// Concurrent misses on the same key may both fetch; the last insert wins.
/// Values are snapshots of an external source so either result is acceptable.
pub struct TtlCache<V> {
    entries: Cache<String, V>,
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(MAX_ENTRIES)
                .build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).await
    }

    pub async fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value).await;
    }

    /// Serve `key` from the cache, or run `fetch` and store its result.
    /// Errors are returned as-is and never stored.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<Cached<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(Cached {
                value,
                cached: true,
            });
        }

        let value = fetch().await?;
        self.insert(key, value.clone()).await;
        Ok(Cached {
            value,
            cached: false,
        })
    }

    /// Number of live entries, after expired ones are swept.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
