//! # Dish Pairing Common Library
//!
//! Shared code for the dish pairing service including:
//! - Error taxonomy
//! - Bootstrap configuration loading
//! - Defensive decoding of persisted JSON columns
//! - Database schema, initialization and models
//! - Cache accessor and its key-value store backends
//! - Write authorization (timestamp + hash)

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod decode;
pub mod error;

pub use cache::{Cache, CacheStatus, CacheStore, CacheTtls, Cached};
pub use decode::safe_decode;
pub use error::{Error, Result};
