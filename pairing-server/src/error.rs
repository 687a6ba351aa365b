//! Error types for pairing-server
//!
//! Store and cache failures are converted here into the client-facing
//! taxonomy; raw internal detail only reaches the response body in
//! development mode.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::error;

/// Whether 500 responses carry the underlying error message
static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// Message returned for internal failures outside development mode
const GENERIC_INTERNAL_MESSAGE: &str = "An unexpected error occurred";

/// Enable full internal error messages (development mode)
pub fn expose_internal_errors(enabled: bool) {
    EXPOSE_INTERNAL_ERRORS.store(enabled, Ordering::Relaxed);
}

/// A single rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client input rejected (400)
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    /// Missing or invalid write authorization (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Store or other internal failure (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Failure of a write request; carries a timestamp for log correlation
    #[error("{source}")]
    Write {
        source: Box<ApiError>,
        timestamp: DateTime<Utc>,
    },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Wrap as a write failure stamped with the current time
    pub fn into_write(self) -> Self {
        match self {
            ApiError::Write { .. } => self,
            other => ApiError::Write {
                source: Box::new(other),
                timestamp: Utc::now(),
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Write { source, .. } => source.status_code(),
        }
    }

    /// Machine-readable error category
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Write { source, .. } => source.code(),
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Validation { message, .. } => message.clone(),
            ApiError::Unauthorized(msg) | ApiError::NotFound(msg) => msg.clone(),
            ApiError::Internal(msg) => {
                if EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed) {
                    msg.clone()
                } else {
                    GENERIC_INTERNAL_MESSAGE.to_string()
                }
            }
            ApiError::Write { source, .. } => source.public_message(),
        }
    }

    fn details(&self) -> Option<&[FieldError]> {
        match self {
            ApiError::Validation { details, .. } if !details.is_empty() => Some(details),
            ApiError::Write { source, .. } => source.details(),
            _ => None,
        }
    }
}

impl From<pairing_common::Error> for ApiError {
    fn from(err: pairing_common::Error) -> Self {
        match err {
            pairing_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            pairing_common::Error::InvalidInput(msg) => ApiError::validation(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let mut error_body = json!({
            "code": self.code(),
            "message": self.public_message(),
        });
        if let Some(details) = self.details() {
            error_body["details"] = json!(details);
        }

        let mut body = json!({
            "success": false,
            "error": error_body,
        });
        if let ApiError::Write { timestamp, .. } = &self {
            body["timestamp"] = json!(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true));
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
