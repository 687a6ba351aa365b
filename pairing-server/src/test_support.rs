//! Fixtures shared by unit tests

use crate::repository::{timestamp_now, upsert, DishRepository};
use pairing_common::db::{init_memory_database, Dish, DishType, NewDish};
use pairing_common::Cache;

/// Repository over a fresh in-memory database and cache
pub async fn repository() -> DishRepository {
    let pool = init_memory_database().await.expect("in-memory database");
    DishRepository::new(pool, Cache::memory())
}

pub fn new_dish(name: &str, slug: &str, dish_type: DishType) -> NewDish {
    NewDish {
        name: name.to_string(),
        slug: slug.to_string(),
        description: None,
        image_url: None,
        cuisine: None,
        dish_type,
        dietary_tags: Vec::new(),
        keywords: Vec::new(),
        seo_title: None,
        seo_description: None,
    }
}

/// Insert a dish directly and return it as stored
pub async fn seed_dish(repo: &DishRepository, name: &str, slug: &str, dish_type: DishType) -> Dish {
    {
        let mut conn = repo.pool().acquire().await.expect("connection");
        upsert::upsert_dish(&mut conn, &new_dish(name, slug, dish_type), &timestamp_now())
            .await
            .expect("seed dish");
    }

    repo.find_dish_by_slug(slug)
        .await
        .expect("lookup")
        .expect("seeded dish")
        .dish
}

/// Insert a pairing edge directly
pub async fn seed_pairing(repo: &DishRepository, main: &Dish, side: &Dish, score: f64, position: i64) {
    let mut conn = repo.pool().acquire().await.expect("connection");
    upsert::upsert_pairing(&mut conn, main.id, side.id, score, position, &timestamp_now())
        .await
        .expect("seed pairing");
}
