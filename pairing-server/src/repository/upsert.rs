//! Idempotent writes keyed by natural keys
//!
//! - dishes: `slug`
//! - recipes: owning `dish_id`
//! - pairings: `(main_dish_id, side_dish_id)`
//!
//! A conflict updates every mutable column and bumps `updated_at`; it never
//! creates a second row. Each function takes a connection so the caller can
//! group several writes into one transaction.

use pairing_common::db::{NewDish, NewRecipe};
use pairing_common::decode::encode_column;
use pairing_common::Result;
use sqlx::SqliteConnection;

/// Insert or update a dish by slug
pub async fn upsert_dish(conn: &mut SqliteConnection, dish: &NewDish, now: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO dishes (
            name, slug, description, image_url, cuisine, dish_type,
            dietary_tags, keywords, seo_title, seo_description,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(slug) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            image_url = excluded.image_url,
            cuisine = excluded.cuisine,
            dish_type = excluded.dish_type,
            dietary_tags = excluded.dietary_tags,
            keywords = excluded.keywords,
            seo_title = excluded.seo_title,
            seo_description = excluded.seo_description,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&dish.name)
    .bind(&dish.slug)
    .bind(&dish.description)
    .bind(&dish.image_url)
    .bind(&dish.cuisine)
    .bind(dish.dish_type.as_str())
    .bind(encode_column(&dish.dietary_tags))
    .bind(encode_column(&dish.keywords))
    .bind(&dish.seo_title)
    .bind(&dish.seo_description)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Insert or update the recipe owned by `dish_id`
pub async fn upsert_recipe(
    conn: &mut SqliteConnection,
    dish_id: i64,
    recipe: &NewRecipe,
    now: &str,
) -> Result<()> {
    let nutrition = recipe.nutrition.as_ref().map(encode_column);

    sqlx::query(
        r#"
        INSERT INTO recipes (
            dish_id, ingredients, instructions, prep_time, cook_time,
            servings, difficulty, nutrition, source_url,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(dish_id) DO UPDATE SET
            ingredients = excluded.ingredients,
            instructions = excluded.instructions,
            prep_time = excluded.prep_time,
            cook_time = excluded.cook_time,
            servings = excluded.servings,
            difficulty = excluded.difficulty,
            nutrition = excluded.nutrition,
            source_url = excluded.source_url,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(dish_id)
    .bind(encode_column(&recipe.ingredients))
    .bind(encode_column(&recipe.instructions))
    .bind(recipe.prep_time)
    .bind(recipe.cook_time)
    .bind(recipe.servings)
    .bind(recipe.difficulty.map(|d| d.as_str()))
    .bind(nutrition)
    .bind(&recipe.source_url)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Insert or update the pairing edge `main_dish_id -> side_dish_id`
pub async fn upsert_pairing(
    conn: &mut SqliteConnection,
    main_dish_id: i64,
    side_dish_id: i64,
    match_score: f64,
    order_position: i64,
    now: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pairings (
            main_dish_id, side_dish_id, match_score, order_position, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(main_dish_id, side_dish_id) DO UPDATE SET
            match_score = excluded.match_score,
            order_position = excluded.order_position,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(main_dish_id)
    .bind(side_dish_id)
    .bind(match_score)
    .bind(order_position)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
