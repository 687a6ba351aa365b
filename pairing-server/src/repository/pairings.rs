//! Side dishes paired with a main dish

use super::{dish_from_row, recipe_from_row, DishRepository, DISH_COLUMNS, RECIPE_COLUMNS};
use pairing_common::cache::keys;
use pairing_common::db::{Dish, PairedSide};
use pairing_common::{Cached, Result};
use sqlx::Row;

/// Read-path bound on side dishes returned per main dish
pub const PAIRINGS_PAGE_SIZE: i64 = 15;

impl DishRepository {
    /// Ordered side dishes for `main` (cache-aside on `pairings:{slug}`)
    ///
    /// Ordered by ascending order position, ties by insertion order, capped at
    /// [`PAIRINGS_PAGE_SIZE`].
    pub async fn get_pairings_for_dish(&self, main: &Dish) -> Result<Cached<Vec<PairedSide>>> {
        let key = keys::pairings(&main.slug);
        if let Some(sides) = self.cache().get::<Vec<PairedSide>>(&key).await {
            return Ok(Cached::hit(sides));
        }

        let sql = format!(
            "SELECT {DISH_COLUMNS}, {RECIPE_COLUMNS}, p.match_score, p.order_position
             FROM pairings p
             JOIN dishes d ON d.id = p.side_dish_id
             LEFT JOIN recipes r ON r.dish_id = d.id
             WHERE p.main_dish_id = ?
             ORDER BY p.order_position ASC, p.id ASC
             LIMIT ?"
        );

        let rows = sqlx::query(&sql)
            .bind(main.id)
            .bind(PAIRINGS_PAGE_SIZE)
            .fetch_all(self.pool())
            .await?;

        let sides = rows
            .iter()
            .map(|row| {
                Ok(PairedSide {
                    dish: dish_from_row(row)?,
                    match_score: row.try_get("match_score")?,
                    order_position: row.try_get("order_position")?,
                    recipe: recipe_from_row(row)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.cache().set(&key, &sides, self.cache().ttls().pairings).await;
        Ok(Cached::miss(sides))
    }
}
