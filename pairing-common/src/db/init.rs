//! Database initialization
//!
//! Creates the SQLite file on first run and brings the schema up with
//! idempotent `CREATE ... IF NOT EXISTS` statements, so every start (and every
//! concurrent cold start) can run it safely.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Process-wide flag for the one-time index setup
///
/// Racing callers may both run the setup; index creation is idempotent so the
/// only cost is a few redundant statements.
static INDEXES_READY: AtomicBool = AtomicBool::new(false);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers alongside the import writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// Limited to a single connection that never expires: every SQLite
/// connection to `:memory:` opens its own empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Create tables and indexes (idempotent)
pub async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_settings_table(pool).await?;
    create_dishes_table(pool).await?;
    create_recipes_table(pool).await?;
    create_pairings_table(pool).await?;
    create_popular_dishes_table(pool).await?;

    ensure_indexes(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores service key-value settings (the API shared secret lives here).
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_dishes_table(pool: &SqlitePool) -> Result<()> {
    // dietary_tags and keywords hold JSON arrays as text
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dishes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT,
            image_url TEXT,
            cuisine TEXT,
            dish_type TEXT NOT NULL
                CHECK (dish_type IN ('main', 'side', 'dessert', 'appetizer', 'beverage')),
            dietary_tags TEXT,
            keywords TEXT,
            seo_title TEXT,
            seo_description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_recipes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dish_id INTEGER NOT NULL UNIQUE REFERENCES dishes(id),
            ingredients TEXT NOT NULL DEFAULT '[]',
            instructions TEXT NOT NULL DEFAULT '[]',
            prep_time INTEGER,
            cook_time INTEGER,
            servings INTEGER,
            difficulty TEXT,
            nutrition TEXT,
            source_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_pairings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pairings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            main_dish_id INTEGER NOT NULL REFERENCES dishes(id),
            side_dish_id INTEGER NOT NULL REFERENCES dishes(id),
            match_score REAL NOT NULL DEFAULT 0,
            order_position INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (main_dish_id, side_dish_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_popular_dishes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS popular_dishes (
            dish_id INTEGER PRIMARY KEY REFERENCES dishes(id),
            view_count INTEGER NOT NULL DEFAULT 0,
            last_viewed TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One-time index setup guarded by [`INDEXES_READY`]
pub async fn ensure_indexes(pool: &SqlitePool) -> Result<()> {
    if INDEXES_READY.load(Ordering::Acquire) {
        debug!("Indexes already ensured");
        return Ok(());
    }

    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_dishes_name ON dishes(name)",
        "CREATE INDEX IF NOT EXISTS idx_dishes_type ON dishes(dish_type)",
        "CREATE INDEX IF NOT EXISTS idx_pairings_main_order ON pairings(main_dish_id, order_position)",
        "CREATE INDEX IF NOT EXISTS idx_popular_rank ON popular_dishes(view_count DESC, last_viewed DESC)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    INDEXES_READY.store(true, Ordering::Release);
    info!("Database indexes ensured");

    Ok(())
}
