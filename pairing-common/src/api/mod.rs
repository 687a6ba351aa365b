//! Shared HTTP API functionality
//!
//! Contains ONLY pure functions, database operations and shared types; the
//! server crate wraps them with axum middleware.

pub mod auth;

pub use auth::{
    calculate_hash, initialize_shared_secret, load_shared_secret, now_millis, validate_hash,
    validate_timestamp, ApiAuthError, TimestampWindow,
};
