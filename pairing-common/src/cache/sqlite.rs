//! SQLite-backed cache store
//!
//! Lets several service processes share one key-value file. Expiry is stored
//! as Unix epoch milliseconds and checked on every read.

use super::CacheStore;
use crate::Result;
use chrono::Utc;
use futures::future::BoxFuture;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Key-value store in a `cache_entries` table
#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// Open (or create) the cache file at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;

        let store = Self::from_pool(pool).await?;
        info!(path = %path.display(), "SQLite cache opened");
        Ok(store)
    }

    /// Use an existing pool, creating the table if needed
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache_entries(expires_at)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl CacheStore for SqliteCacheStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let value: Option<String> = sqlx::query_scalar(
                "SELECT value FROM cache_entries WHERE key = ? AND expires_at > ?",
            )
            .bind(key)
            .bind(now_ms())
            .fetch_optional(&self.pool)
            .await?;

            Ok(value)
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if ttl.is_zero() {
                return Ok(());
            }
            let expires_at = now_ms() + ttl.as_millis() as i64;

            sqlx::query(
                r#"
                INSERT INTO cache_entries (key, value, expires_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    expires_at = excluded.expires_at
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            sqlx::query("DELETE FROM cache_entries WHERE key = ?")
                .bind(key)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }

    fn clear_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            // substr() avoids LIKE wildcard escaping for prefixes containing % or _
            let result = sqlx::query(
                "DELETE FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1",
            )
            .bind(prefix)
            .execute(&self.pool)
            .await?;

            Ok(result.rows_affected())
        })
    }

    fn purge_expired(&self) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
                .bind(now_ms())
                .execute(&self.pool)
                .await?;

            Ok(result.rows_affected())
        })
    }
}
