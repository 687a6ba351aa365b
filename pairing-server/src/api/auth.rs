//! Write authorization middleware
//!
//! The request body carries `timestamp` and `hash`; the hash covers the
//! canonical JSON of the body plus the shared secret. Applied to write routes
//! only.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use pairing_common::api::{validate_hash, validate_timestamp, ApiAuthError};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Largest body read for hash validation
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct AuthFields {
    timestamp: i64,
    hash: String,
}

/// Authentication middleware
///
/// Returns 401 on a bad timestamp or hash, 400 when the body cannot be read.
/// A shared secret of 0 disables the check.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if state.shared_secret == 0 {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AuthError::ParseError(format!("Failed to read body: {}", e)))?;

    let json_value: Value = serde_json::from_slice(&body_bytes)
        .map_err(|e| AuthError::ParseError(format!("Invalid JSON: {}", e)))?;

    let auth_fields: AuthFields = serde_json::from_value(json_value.clone())
        .map_err(|e| AuthError::MissingFields(e.to_string()))?;

    validate_timestamp(auth_fields.timestamp, state.auth_window).map_err(|e| match e {
        ApiAuthError::InvalidTimestamp { reason, .. } => AuthError::InvalidTimestamp(reason),
        _ => AuthError::Other(e.to_string()),
    })?;

    validate_hash(&auth_fields.hash, &json_value, state.shared_secret).map_err(|e| match e {
        ApiAuthError::InvalidHash {
            provided,
            calculated,
        } => {
            warn!(
                "Hash validation failed: provided={}, calculated={}",
                provided, calculated
            );
            AuthError::InvalidHash
        }
        _ => AuthError::Other(e.to_string()),
    })?;

    // Downstream handlers read the body again
    let request = Request::from_parts(parts, Body::from(body_bytes));

    Ok(next.run(request).await)
}

/// Authentication failures
#[derive(Debug)]
pub enum AuthError {
    InvalidTimestamp(String),
    InvalidHash,
    MissingFields(String),
    ParseError(String),
    Other(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidTimestamp(reason) => {
                ApiError::Unauthorized(format!("Invalid timestamp: {}", reason))
            }
            AuthError::InvalidHash => ApiError::Unauthorized("Invalid hash".to_string()),
            AuthError::MissingFields(msg) => {
                ApiError::validation(format!("Missing required fields: {}", msg))
            }
            AuthError::ParseError(msg) => ApiError::validation(format!("Parse error: {}", msg)),
            AuthError::Other(msg) => ApiError::Internal(format!("Authentication error: {}", msg)),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_write().into_response()
    }
}
