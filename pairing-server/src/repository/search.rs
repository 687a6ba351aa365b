//! Ranked substring search and category listing

use super::{dish_from_row, like_pattern, DishRepository, DISH_COLUMNS};
use crate::pagination::Pagination;
use pairing_common::cache::keys;
use pairing_common::db::{Dish, DishType};
use pairing_common::{Cached, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Shortest query that is executed
pub const MIN_QUERY_CHARS: usize = 2;

/// One page of search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub dishes: Vec<Dish>,
    pub total: i64,
}

impl DishRepository {
    /// Substring search on name and description
    /// (cache-aside on `search:{query}:{page}:{limit}`)
    ///
    /// Ranking tiers: name equals the query, then name contains it, then
    /// description-only matches. Alphabetical by name within a tier.
    /// Queries shorter than [`MIN_QUERY_CHARS`] are rejected with
    /// [`Error::InvalidInput`] before touching the cache or the store.
    pub async fn search(&self, query: &str, page: Pagination) -> Result<Cached<SearchPage>> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Err(Error::InvalidInput(format!(
                "Search query must be at least {} characters",
                MIN_QUERY_CHARS
            )));
        }

        let key = keys::search(query, page.page, page.limit);
        if let Some(results) = self.cache().get::<SearchPage>(&key).await {
            return Ok(Cached::hit(results));
        }

        let pattern = like_pattern(query);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM dishes
             WHERE name LIKE ?1 ESCAPE '\\' OR description LIKE ?1 ESCAPE '\\'",
        )
        .bind(&pattern)
        .fetch_one(self.pool())
        .await?;

        let sql = format!(
            "SELECT {DISH_COLUMNS} FROM dishes d
             WHERE d.name LIKE ?1 ESCAPE '\\' OR d.description LIKE ?1 ESCAPE '\\'
             ORDER BY
                 CASE
                     WHEN lower(d.name) = lower(?2) THEN 0
                     WHEN d.name LIKE ?1 ESCAPE '\\' THEN 1
                     ELSE 2
                 END,
                 d.name COLLATE NOCASE ASC,
                 d.id ASC
             LIMIT ?3 OFFSET ?4"
        );

        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(query)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool())
            .await?;

        let results = SearchPage {
            dishes: rows.iter().map(dish_from_row).collect::<Result<_>>()?,
            total,
        };

        self.cache().set(&key, &results, self.cache().ttls().search).await;
        Ok(Cached::miss(results))
    }

    /// Distinct dish types present in the store, ordered by stored value
    /// (cache-aside on `categories`)
    pub async fn list_categories(&self) -> Result<Cached<Vec<DishType>>> {
        if let Some(categories) = self.cache().get::<Vec<DishType>>(keys::CATEGORIES).await {
            return Ok(Cached::hit(categories));
        }

        let stored: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT dish_type FROM dishes ORDER BY dish_type")
                .fetch_all(self.pool())
                .await?;

        let categories: Vec<DishType> = stored
            .iter()
            .filter_map(|value| match value.parse::<DishType>() {
                Ok(dish_type) => Some(dish_type),
                Err(_) => {
                    warn!(dish_type = %value, "Skipping unknown stored dish type");
                    None
                }
            })
            .collect();

        self.cache()
            .set(keys::CATEGORIES, &categories, self.cache().ttls().categories)
            .await;
        Ok(Cached::miss(categories))
    }
}
