//! Dish/Pairing repository
//!
//! Reads are cache-aside: check the [`Cache`], on miss query SQLite, run
//! array columns through the safe decoder, populate the cache and return.
//! Writes are natural-key upserts (see [`upsert`]) executed inside the
//! caller's transaction.

pub mod dishes;
pub mod pairings;
pub mod search;
pub mod upsert;

use chrono::{SecondsFormat, Utc};
use pairing_common::cache::keys;
use pairing_common::db::{Difficulty, Dish, DishType, Recipe};
use pairing_common::{safe_decode, Cache, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};

pub use dishes::DishPage;
pub use pairings::PAIRINGS_PAGE_SIZE;
pub use search::{SearchPage, MIN_QUERY_CHARS};

/// Dish columns, selected from the `d` alias
pub(crate) const DISH_COLUMNS: &str = "d.id, d.name, d.slug, d.description, d.image_url, \
     d.cuisine, d.dish_type, d.dietary_tags, d.keywords, d.seo_title, d.seo_description, \
     d.created_at, d.updated_at";

/// Recipe columns from a LEFT JOIN on the `r` alias, prefixed to avoid clashes
pub(crate) const RECIPE_COLUMNS: &str = "r.dish_id AS recipe_dish_id, \
     r.ingredients AS recipe_ingredients, r.instructions AS recipe_instructions, \
     r.prep_time AS recipe_prep_time, r.cook_time AS recipe_cook_time, \
     r.servings AS recipe_servings, r.difficulty AS recipe_difficulty, \
     r.nutrition AS recipe_nutrition, r.source_url AS recipe_source_url";

/// Access to dishes, recipes and pairings
#[derive(Clone)]
pub struct DishRepository {
    pool: SqlitePool,
    cache: Cache,
}

impl DishRepository {
    pub fn new(pool: SqlitePool, cache: Cache) -> Self {
        Self { pool, cache }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Start a write batch; rows commit together or not at all
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Drop every cached read a write to these dishes could have changed
    ///
    /// Exact `dish:`/`pairings:` keys for the main dish, `dish:` keys for the
    /// side dishes, and the listing-style namespaces whose contents depend on
    /// the whole catalog.
    pub async fn invalidate_after_write(&self, main_slug: &str, side_slugs: &[String]) {
        self.cache.delete(&keys::dish(main_slug)).await;
        self.cache.delete(&keys::pairings(main_slug)).await;
        for slug in side_slugs {
            self.cache.delete(&keys::dish(slug)).await;
        }

        self.cache.clear_by_prefix(keys::SEARCH_PREFIX).await;
        self.cache.clear_by_prefix(keys::DISHES_PREFIX).await;
        self.cache.clear_by_prefix(keys::POPULAR_PREFIX).await;
        self.cache.delete(keys::CATEGORIES).await;

        debug!(main_slug, sides = side_slugs.len(), "Invalidated cache after write");
    }
}

/// Current time as fixed-width RFC 3339 UTC text
///
/// Fixed width keeps text ordering equal to time ordering.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `%term%` LIKE pattern with wildcards in `term` escaped by `\`
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub(crate) fn dish_from_row(row: &SqliteRow) -> Result<Dish> {
    let id: i64 = row.try_get("id")?;
    let dish_type: String = row.try_get("dish_type")?;
    let dish_type = dish_type.parse::<DishType>().map_err(|_| {
        Error::Internal(format!("Unknown dish type '{}' stored for dish {}", dish_type, id))
    })?;

    let dietary_tags: Option<String> = row.try_get("dietary_tags")?;
    let keywords: Option<String> = row.try_get("keywords")?;

    Ok(Dish {
        id,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        cuisine: row.try_get("cuisine")?,
        dish_type,
        dietary_tags: safe_decode("dietary_tags", dietary_tags.as_deref(), Vec::new()),
        keywords: safe_decode("keywords", keywords.as_deref(), Vec::new()),
        seo_title: row.try_get("seo_title")?,
        seo_description: row.try_get("seo_description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Recipe from [`RECIPE_COLUMNS`]; `None` when the LEFT JOIN found no recipe
pub(crate) fn recipe_from_row(row: &SqliteRow) -> Result<Option<Recipe>> {
    let dish_id: Option<i64> = row.try_get("recipe_dish_id")?;
    let Some(dish_id) = dish_id else {
        return Ok(None);
    };

    let ingredients: Option<String> = row.try_get("recipe_ingredients")?;
    let instructions: Option<String> = row.try_get("recipe_instructions")?;
    let nutrition: Option<String> = row.try_get("recipe_nutrition")?;
    let difficulty: Option<String> = row.try_get("recipe_difficulty")?;

    let difficulty = difficulty.and_then(|d| match d.parse::<Difficulty>() {
        Ok(difficulty) => Some(difficulty),
        Err(_) => {
            warn!(dish_id, difficulty = %d, "Unknown stored difficulty, ignoring");
            None
        }
    });

    Ok(Some(Recipe {
        dish_id,
        ingredients: safe_decode("ingredients", ingredients.as_deref(), Vec::new()),
        instructions: safe_decode("instructions", instructions.as_deref(), Vec::new()),
        prep_time: row.try_get("recipe_prep_time")?,
        cook_time: row.try_get("recipe_cook_time")?,
        servings: row.try_get("recipe_servings")?,
        difficulty,
        nutrition: safe_decode("nutrition", nutrition.as_deref(), None),
        source_url: row.try_get("recipe_source_url")?,
    }))
}
