//! Write authorization via timestamp and hash validation
//!
//! # Scheme
//!
//! - Write requests carry `timestamp` (i64 Unix epoch ms) and `hash` (SHA-256)
//!   in their JSON body
//! - Timestamp must fall inside a configurable window around "now"
//! - Hash is calculated from canonical JSON + shared secret
//! - Shared secret lives in the `settings` table (or bootstrap config)
//! - A shared secret of 0 disables checking
//!
//! This module holds only pure functions and database operations; the axum
//! middleware wrapping them lives in the server crate.

use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;

/// Placeholder substituted for the hash field before hashing
const DUMMY_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Authentication error types
#[derive(Debug, Clone, Error)]
pub enum ApiAuthError {
    /// Timestamp outside acceptable window
    #[error("Invalid timestamp: {reason}")]
    InvalidTimestamp {
        timestamp: i64,
        now: i64,
        reason: String,
    },

    /// Hash does not match calculated value
    #[error("Invalid hash")]
    InvalidHash { provided: String, calculated: String },

    /// Database error loading shared secret
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Accepted distance between a request timestamp and the server clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampWindow {
    pub max_past_ms: i64,
    pub max_future_ms: i64,
}

impl Default for TimestampWindow {
    fn default() -> Self {
        Self {
            max_past_ms: 30_000,
            max_future_ms: 1_000,
        }
    }
}

// ========================================
// Shared Secret Management
// ========================================

/// Load shared secret from database settings
///
/// - Key: `api_shared_secret`
/// - Value: i64
/// - Special value 0: disables auth checking
///
/// A missing secret is generated and stored.
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    let result: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = 'api_shared_secret'")
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match result {
        Some((Some(value),)) => value
            .trim()
            .parse::<i64>()
            .map_err(|e| ApiAuthError::DatabaseError(format!("Invalid i64: {}", e))),
        _ => initialize_shared_secret(db).await,
    }
}

/// Generate a random non-zero secret and store it
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let secret: i64 = loop {
        let val = rng.gen::<i64>();
        if val != 0 {
            break val;
        }
    };

    sqlx::query(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES ('api_shared_secret', ?, CURRENT_TIMESTAMP)",
    )
    .bind(secret.to_string())
    .execute(db)
    .await
    .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

// ========================================
// Timestamp Validation
// ========================================

/// Current time in Unix epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Validate timestamp against the window
///
/// # Examples
///
/// ```
/// use pairing_common::api::auth::{now_millis, validate_timestamp, TimestampWindow};
///
/// let window = TimestampWindow { max_past_ms: 1000, max_future_ms: 1 };
/// let now = now_millis();
///
/// assert!(validate_timestamp(now - 500, window).is_ok());
/// assert!(validate_timestamp(now - 5000, window).is_err());
/// ```
pub fn validate_timestamp(timestamp: i64, window: TimestampWindow) -> Result<(), ApiAuthError> {
    let now = now_millis();
    let diff = now - timestamp;

    if diff > window.max_past_ms {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!(
                "Timestamp {}ms too old (max {}ms past)",
                diff, window.max_past_ms
            ),
        });
    }

    if diff < -window.max_future_ms {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!(
                "Timestamp {}ms in future (max {}ms future)",
                diff.abs(),
                window.max_future_ms
            ),
        });
    }

    Ok(())
}

// ========================================
// Hash Calculation and Validation
// ========================================

/// Calculate the request hash
///
/// 1. Replace hash field with 64 zeros
/// 2. Convert to canonical JSON (sorted keys, no whitespace)
/// 3. Append shared secret as decimal string
/// 4. SHA-256, rendered as 64 hex characters
pub fn calculate_hash(json_value: &Value, shared_secret: i64) -> String {
    let mut value = json_value.clone();
    if let Some(obj) = value.as_object_mut() {
        obj.insert("hash".to_string(), Value::String(DUMMY_HASH.to_string()));
    }

    let canonical = to_canonical_json(&value);
    let to_hash = format!("{}{}", canonical, shared_secret);

    let mut hasher = Sha256::new();
    hasher.update(to_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Convert JSON to canonical form (sorted keys, no whitespace)
///
/// # Examples
///
/// ```
/// use pairing_common::api::auth::to_canonical_json;
/// use serde_json::json;
///
/// let canonical = to_canonical_json(&json!({"z": 3, "a": [1, {"c": null, "b": true}]}));
/// assert_eq!(canonical, r#"{"a":[1,{"b":true,"c":null}],"z":3}"#);
/// ```
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}:{}", quote(k), to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::String(s) => quote(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

/// Validate hash matches calculated value
pub fn validate_hash(
    provided_hash: &str,
    json_value: &Value,
    shared_secret: i64,
) -> Result<(), ApiAuthError> {
    let calculated = calculate_hash(json_value, shared_secret);

    if !provided_hash.eq_ignore_ascii_case(&calculated) {
        return Err(ApiAuthError::InvalidHash {
            provided: provided_hash.to_string(),
            calculated,
        });
    }

    Ok(())
}
