//! Process-local cache store backed by moka
//!
//! Each entry carries its own TTL; moka expires it and never returns it
//! afterwards, so reads need no expiry check here.

use super::CacheStore;
use crate::Result;
use futures::future::BoxFuture;
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Entries kept before moka starts evicting (TinyLFU admission)
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    value: Arc<str>,
    ttl: Duration,
}

/// Per-entry TTL; an update restarts the clock with the new TTL
struct EntryTtl;

impl Expiry<String, Entry> for EntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-memory key-value store
#[derive(Clone)]
pub struct MemoryCacheStore {
    inner: Cache<String, Entry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryTtl)
            .build();
        Self { inner }
    }

    /// Number of live entries, after moka's pending evictions have run
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { Ok(self.inner.get(key).await.map(|entry| entry.value.to_string())) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if ttl.is_zero() {
                return Ok(());
            }
            let entry = Entry {
                value: value.into(),
                ttl,
            };
            self.inner.insert(key.to_string(), entry).await;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.inner.invalidate(key).await;
            Ok(())
        })
    }

    fn clear_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            // Collected first: removal is immediate, unlike invalidate_entries_if
            let keys: Vec<Arc<String>> = self
                .inner
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, _)| key)
                .collect();

            for key in &keys {
                self.inner.invalidate(key.as_str()).await;
            }
            Ok(keys.len() as u64)
        })
    }

    fn purge_expired(&self) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            let before = self.inner.entry_count();
            self.inner.run_pending_tasks().await;
            Ok(before.saturating_sub(self.inner.entry_count()))
        })
    }
}
