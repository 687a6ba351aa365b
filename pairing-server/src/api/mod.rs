//! HTTP API handlers for pairing-server

pub mod auth;
pub mod dishes;
pub mod health;
pub mod import;
pub mod legacy;
pub mod response;
pub mod search;

pub use auth::auth_middleware;
pub use dishes::{get_dish, get_pairings, list_dishes, popular_dishes};
pub use health::health_routes;
pub use import::import_dishes;
pub use legacy::legacy_redirect;
pub use search::{list_categories, search};
