//! pairing-server - Dish Pairing Service
//!
//! Loads configuration, opens the catalog database and cache, and serves the
//! HTTP API until Ctrl-C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pairing_common::api::{load_shared_secret, TimestampWindow};
use pairing_common::cache::{CacheStore, MemoryCacheStore, SqliteCacheStore};
use pairing_common::config::{CacheBackend, ConfigOverrides, ServiceConfig};
use pairing_common::db::init_database;
use pairing_common::Cache;
use pairing_server::error::expose_internal_errors;
use pairing_server::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Interval between expired cache entry sweeps
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(600);

/// Command-line arguments for pairing-server
#[derive(Parser, Debug)]
#[command(name = "pairing-server")]
#[command(about = "Dish Pairing Service")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "PAIRING_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database and cache files
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let overrides = ConfigOverrides {
        config_file: args.config,
        root_folder: args.root_folder,
        host: args.host,
        port: args.port,
        database: args.database,
    };

    // Configuration decides the log level, so it is loaded under a bootstrap logger
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || ServiceConfig::load(&overrides))
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Dish Pairing Service (pairing-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Environment: {:?}", config.environment);

    expose_internal_errors(config.environment.is_development());

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let store: Arc<dyn CacheStore> = match config.cache.backend {
        CacheBackend::Memory => {
            info!("Cache backend: memory");
            Arc::new(MemoryCacheStore::new())
        }
        CacheBackend::Sqlite => {
            let cache_path = config.cache_path();
            info!("Cache backend: sqlite ({})", cache_path.display());
            Arc::new(
                SqliteCacheStore::open(&cache_path)
                    .await
                    .context("Failed to open cache store")?,
            )
        }
    };
    let cache = Cache::new(store, config.cache.ttls());

    let shared_secret = match config.auth.shared_secret {
        Some(secret) => secret,
        None => load_shared_secret(&pool)
            .await
            .context("Failed to load shared secret")?,
    };
    if shared_secret == 0 {
        warn!("API authentication disabled (shared_secret = 0)");
    } else {
        info!("Loaded shared secret for API authentication");
    }

    spawn_cache_purge(cache.clone());

    let state = AppState::new(pool, cache, &config.legacy_prefix, shared_secret)
        .with_auth_window(TimestampWindow {
            max_past_ms: config.auth.max_past_ms,
            max_future_ms: config.auth.max_future_ms,
        });
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("pairing-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Sweep expired cache entries in the background
fn spawn_cache_purge(cache: Cache) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = cache.purge_expired().await;
            if removed > 0 {
                info!(removed, "Purged expired cache entries");
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
