//! pairing-server library - Dish Pairing Service
//!
//! Serves "main dish → side dish" pairings over HTTP: resolves loosely
//! formatted slugs, reads through a cache-aside layer, imports dish batches
//! idempotently and counts views without blocking the read path.

use axum::http::Method;
use axum::Router;
use pairing_common::api::TimestampWindow;
use pairing_common::Cache;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod import;
pub mod pagination;
pub mod popularity;
pub mod repository;
pub mod slug;

#[cfg(test)]
mod test_support;

use import::ImportOrchestrator;
use popularity::PopularityTracker;
use repository::DishRepository;
use slug::SlugResolver;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub repo: DishRepository,
    pub resolver: SlugResolver,
    pub popularity: PopularityTracker,
    pub importer: ImportOrchestrator,
    /// Shared secret for write authorization; 0 disables the check
    pub shared_secret: i64,
    pub auth_window: TimestampWindow,
}

impl AppState {
    /// Wire every component over one store and one cache
    pub fn new(db: SqlitePool, cache: Cache, legacy_prefix: &str, shared_secret: i64) -> Self {
        let repo = DishRepository::new(db.clone(), cache.clone());
        Self {
            resolver: SlugResolver::new(repo.clone(), legacy_prefix),
            popularity: PopularityTracker::new(db, cache),
            importer: ImportOrchestrator::new(repo.clone(), legacy_prefix),
            repo,
            shared_secret,
            auth_window: TimestampWindow::default(),
        }
    }

    pub fn with_auth_window(mut self, window: TimestampWindow) -> Self {
        self.auth_window = window;
        self
    }
}

/// Build application router
///
/// Catalog routes are served at the root and again under `/api`. The legacy
/// `/{segment}` route exists at the root only. Health needs no auth; import
/// does.
pub fn build_router(state: AppState) -> Router {
    let catalog = catalog_routes(&state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .merge(api::health_routes())
        .merge(catalog.clone())
        .nest("/api", catalog)
        .route("/:segment", axum::routing::get(api::legacy_redirect))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn catalog_routes(state: &AppState) -> Router<AppState> {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/import-dishes", post(api::import_dishes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .route("/dishes", get(api::list_dishes))
        .route("/dishes/popular", get(api::popular_dishes))
        .route("/dishes/:slug", get(api::get_dish))
        .route("/dishes/:slug/pairings", get(api::get_pairings))
        .route("/search", get(api::search))
        .route("/categories", get(api::list_categories))
        .merge(protected)
}
