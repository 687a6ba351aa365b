//! Common error types for the dish pairing service

use thiserror::Error;

/// Common result type for pairing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the pairing crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key-value cache store failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for the not-found outcome, which callers treat as an expected result
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
