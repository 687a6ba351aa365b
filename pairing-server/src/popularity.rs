//! View counters for dishes
//!
//! Counting is an analytics side effect of the pairing read path. The read
//! path dispatches [`PopularityTracker::spawn_record_view`] and never awaits
//! it; a failed write is logged and dropped.

use crate::repository::{dish_from_row, timestamp_now, DISH_COLUMNS};
use pairing_common::cache::keys;
use pairing_common::db::{PopularDish, PopularityRecord};
use pairing_common::{Cache, Cached, Result};
use sqlx::{Row, SqlitePool};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default number of dishes returned by the popular listing
pub const DEFAULT_POPULAR_LIMIT: i64 = 10;

/// Largest popular listing a client may request
pub const MAX_POPULAR_LIMIT: i64 = 50;

/// Sole writer of `popular_dishes`
#[derive(Clone)]
pub struct PopularityTracker {
    pool: SqlitePool,
    cache: Cache,
}

impl PopularityTracker {
    pub fn new(pool: SqlitePool, cache: Cache) -> Self {
        Self { pool, cache }
    }

    /// Count one view of `dish_id`
    ///
    /// The first view creates the record with a count of 1. Later views
    /// increment it in the same statement, so concurrent views never lose a
    /// count or race on creation.
    pub async fn record_view(&self, dish_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO popular_dishes (dish_id, view_count, last_viewed)
            VALUES (?, 1, ?)
            ON CONFLICT(dish_id) DO UPDATE SET
                view_count = view_count + 1,
                last_viewed = excluded.last_viewed
            "#,
        )
        .bind(dish_id)
        .bind(timestamp_now())
        .execute(&self.pool)
        .await?;

        debug!(dish_id, "Recorded dish view");
        Ok(())
    }

    /// Fire-and-forget [`record_view`](Self::record_view)
    ///
    /// The returned handle exists for tests; request handlers drop it.
    pub fn spawn_record_view(&self, dish_id: i64) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            if let Err(e) = tracker.record_view(dish_id).await {
                warn!(dish_id, error = %e, "Failed to record dish view");
            }
        })
    }

    /// Current counters for `dish_id`, if it was ever viewed
    pub async fn record_for(&self, dish_id: i64) -> Result<Option<PopularityRecord>> {
        let row = sqlx::query(
            "SELECT dish_id, view_count, last_viewed FROM popular_dishes WHERE dish_id = ?",
        )
        .bind(dish_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(PopularityRecord {
                dish_id: row.try_get("dish_id")?,
                view_count: row.try_get("view_count")?,
                last_viewed: row.try_get("last_viewed")?,
            })
        })
        .transpose()
    }

    /// Most viewed dishes, ties broken by most recent view
    /// (cache-aside on `popular:{limit}`)
    pub async fn popular_dishes(&self, limit: i64) -> Result<Cached<Vec<PopularDish>>> {
        let key = keys::popular(limit);
        if let Some(dishes) = self.cache.get::<Vec<PopularDish>>(&key).await {
            return Ok(Cached::hit(dishes));
        }

        let sql = format!(
            "SELECT {DISH_COLUMNS}, p.view_count, p.last_viewed
             FROM popular_dishes p
             JOIN dishes d ON d.id = p.dish_id
             ORDER BY p.view_count DESC, p.last_viewed DESC
             LIMIT ?"
        );

        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;

        let dishes = rows
            .iter()
            .map(|row| {
                Ok(PopularDish {
                    dish: dish_from_row(row)?,
                    view_count: row.try_get("view_count")?,
                    last_viewed: row.try_get("last_viewed")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.cache.set(&key, &dishes, self.cache.ttls().popular).await;
        Ok(Cached::miss(dishes))
    }
}
