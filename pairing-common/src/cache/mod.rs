//! Cache accessor over a key-value store with per-entry TTL
//!
//! The cache is a performance optimization, never a correctness dependency:
//! [`Cache`] turns every store failure into a miss (reads) or a no-op (writes),
//! logging it at `warn`. Values are stored as JSON text so any store that holds
//! strings can back it.

pub mod keys;
pub mod memory;
pub mod sqlite;

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

use crate::Result;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Raw key-value store operations
///
/// Implementations report failures; [`Cache`] decides they are non-fatal.
pub trait CacheStore: Send + Sync {
    /// Value for `key`, or `None` when absent or expired
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

    /// Store `value` under `key` for `ttl`
    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, Result<()>>;

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Delete every key starting with `prefix`; returns the number removed
    fn clear_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<u64>>;

    /// Drop expired entries; returns the number removed
    fn purge_expired(&self) -> BoxFuture<'_, Result<u64>>;
}

/// Default TTLs (seconds) per cached resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// `dish:{slug}`; changes only through import
    pub dish: u64,
    /// `pairings:{slug}`; changes only through import
    pub pairings: u64,
    /// `search:{query}:{page}:{limit}`; cheap to recompute
    pub search: u64,
    /// `categories`
    pub categories: u64,
    /// `dishes:{type}:{limit}:{offset}`
    pub listing: u64,
    /// `popular:{limit}`; moves with every view
    pub popular: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            dish: 3600,
            pairings: 3600,
            search: 300,
            categories: 3600,
            listing: 300,
            popular: 120,
        }
    }
}

/// Whether a read was served from cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A value along with where it came from
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub value: T,
    pub status: CacheStatus,
}

impl<T> Cached<T> {
    pub fn hit(value: T) -> Self {
        Self {
            value,
            status: CacheStatus::Hit,
        }
    }

    pub fn miss(value: T) -> Self {
        Self {
            value,
            status: CacheStatus::Miss,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Cached<U> {
        Cached {
            value: f(self.value),
            status: self.status,
        }
    }
}

/// Typed, failure-tolerant access to a [`CacheStore`]
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    ttls: CacheTtls,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>, ttls: CacheTtls) -> Self {
        Self { store, ttls }
    }

    /// Process-local cache with default TTLs
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()), CacheTtls::default())
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Cached value for `key`
    ///
    /// Store failures and undecodable entries count as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Undecodable cache entry, treating as miss");
                None
            }
        }
    }

    /// Store `value` under `key` for `ttl_secs` seconds
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Could not serialize cache value");
                return;
            }
        };

        if let Err(e) = self
            .store
            .set(key, raw, Duration::from_secs(ttl_secs))
            .await
        {
            warn!(key, error = %e, "Cache write failed");
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, error = %e, "Cache delete failed");
        }
    }

    /// Delete every key sharing `prefix`; returns the number removed (0 on failure)
    pub async fn clear_by_prefix(&self, prefix: &str) -> u64 {
        match self.store.clear_prefix(prefix).await {
            Ok(removed) => {
                debug!(prefix, removed, "Cleared cache prefix");
                removed
            }
            Err(e) => {
                warn!(prefix, error = %e, "Cache prefix clear failed");
                0
            }
        }
    }

    /// Drop expired entries; returns the number removed (0 on failure)
    pub async fn purge_expired(&self) -> u64 {
        match self.store.purge_expired().await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Cache purge failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    /// Store that fails every operation
    struct BrokenStore;

    impl CacheStore for BrokenStore {
        fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
            Box::pin(async { Err(Error::Cache("connection refused".to_string())) })
        }

        fn set<'a>(&'a self, _key: &'a str, _value: String, _ttl: Duration) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Err(Error::Cache("connection refused".to_string())) })
        }

        fn delete<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Err(Error::Cache("connection refused".to_string())) })
        }

        fn clear_prefix<'a>(&'a self, _prefix: &'a str) -> BoxFuture<'a, Result<u64>> {
            Box::pin(async { Err(Error::Cache("connection refused".to_string())) })
        }

        fn purge_expired(&self) -> BoxFuture<'_, Result<u64>> {
            Box::pin(async { Err(Error::Cache("connection refused".to_string())) })
        }
    }

    #[tokio::test]
    async fn test_store_failures_degrade_silently() {
        let cache = Cache::new(Arc::new(BrokenStore), CacheTtls::default());

        cache.set("dish:cornbread", &vec!["a".to_string()], 60).await;
        let value: Option<Vec<String>> = cache.get("dish:cornbread").await;
        assert!(value.is_none());

        cache.delete("dish:cornbread").await;
        assert_eq!(cache.clear_by_prefix("dish:").await, 0);
        assert_eq!(cache.purge_expired().await, 0);
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let cache = Cache::memory();

        cache.set("categories", &vec!["main", "side"], 60).await;
        let value: Option<Vec<String>> = cache.get("categories").await;
        assert_eq!(value, Some(vec!["main".to_string(), "side".to_string()]));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let cache = Cache::memory();
        cache
            .store()
            .set("categories", "not json".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<Vec<String>> = cache.get("categories").await;
        assert!(value.is_none());
    }
}
