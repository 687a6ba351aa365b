//! Dish lookups and listing

use super::{dish_from_row, like_pattern, recipe_from_row, DishRepository, DISH_COLUMNS, RECIPE_COLUMNS};
use pairing_common::cache::keys;
use pairing_common::db::{Dish, DishDetail, DishType};
use pairing_common::{Cached, Error, Result};
use serde::{Deserialize, Serialize};

/// One page of the dish listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishPage {
    pub dishes: Vec<Dish>,
    pub total: i64,
}

impl DishRepository {
    /// Dish and optional recipe by exact slug (cache-aside on `dish:{slug}`)
    ///
    /// An unknown slug is reported as [`Error::NotFound`].
    pub async fn get_dish_by_slug(&self, slug: &str) -> Result<Cached<DishDetail>> {
        let key = keys::dish(slug);
        if let Some(detail) = self.cache().get::<DishDetail>(&key).await {
            return Ok(Cached::hit(detail));
        }

        let detail = self
            .find_dish_by_slug(slug)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Dish '{}' not found", slug)))?;

        self.cache().set(&key, &detail, self.cache().ttls().dish).await;
        Ok(Cached::miss(detail))
    }

    /// Store lookup by exact slug, bypassing the cache
    pub async fn find_dish_by_slug(&self, slug: &str) -> Result<Option<DishDetail>> {
        let sql = format!(
            "SELECT {DISH_COLUMNS}, {RECIPE_COLUMNS}
             FROM dishes d
             LEFT JOIN recipes r ON r.dish_id = d.id
             WHERE d.slug = ?"
        );

        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(self.pool())
            .await?;

        match row {
            Some(row) => Ok(Some(DishDetail {
                dish: dish_from_row(&row)?,
                recipe: recipe_from_row(&row)?,
            })),
            None => Ok(None),
        }
    }

    /// Identifier currently stored for `slug`
    pub async fn dish_id_for_slug(&self, slug: &str) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM dishes WHERE slug = ?")
            .bind(slug)
            .fetch_optional(self.pool())
            .await?;
        Ok(id)
    }

    /// Dishes whose slug contains `term`, shortest slug first
    pub async fn find_by_slug_containing(&self, term: &str, limit: i64) -> Result<Vec<Dish>> {
        let sql = format!(
            "SELECT {DISH_COLUMNS} FROM dishes d
             WHERE d.slug LIKE ? ESCAPE '\\'
             ORDER BY length(d.slug) ASC, d.slug ASC
             LIMIT ?"
        );

        let rows = sqlx::query(&sql)
            .bind(like_pattern(term))
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(dish_from_row).collect()
    }

    /// Dishes whose name contains `term` (case-insensitive), shortest name first
    pub async fn find_by_name_containing(&self, term: &str, limit: i64) -> Result<Vec<Dish>> {
        let sql = format!(
            "SELECT {DISH_COLUMNS} FROM dishes d
             WHERE d.name LIKE ? ESCAPE '\\'
             ORDER BY length(d.name) ASC, d.name COLLATE NOCASE ASC
             LIMIT ?"
        );

        let rows = sqlx::query(&sql)
            .bind(like_pattern(term))
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(dish_from_row).collect()
    }

    /// Paginated dish listing, optionally filtered by type
    /// (cache-aside on `dishes:{type}:{limit}:{offset}`)
    pub async fn list_dishes(
        &self,
        dish_type: Option<DishType>,
        limit: i64,
        offset: i64,
    ) -> Result<Cached<DishPage>> {
        let type_filter = dish_type.map(DishType::as_str);
        let key = keys::dishes(type_filter, limit, offset);
        if let Some(page) = self.cache().get::<DishPage>(&key).await {
            return Ok(Cached::hit(page));
        }

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM dishes WHERE ?1 IS NULL OR dish_type = ?1")
                .bind(type_filter)
                .fetch_one(self.pool())
                .await?;

        let sql = format!(
            "SELECT {DISH_COLUMNS} FROM dishes d
             WHERE ?1 IS NULL OR d.dish_type = ?1
             ORDER BY d.name COLLATE NOCASE ASC, d.id ASC
             LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(type_filter)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool())
            .await?;

        let page = DishPage {
            dishes: rows.iter().map(dish_from_row).collect::<Result<_>>()?,
            total,
        };

        self.cache().set(&key, &page, self.cache().ttls().listing).await;
        Ok(Cached::miss(page))
    }
}
