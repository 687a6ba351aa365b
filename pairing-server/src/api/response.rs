//! Response envelope and header helpers

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use pairing_common::CacheStatus;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};

/// Hit/miss signal on every cached read
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Set to `suggestion` when a redirect target is a best-effort guess
pub const X_SLUG_RESOLUTION: HeaderName = HeaderName::from_static("x-slug-resolution");

/// `{success: true, data}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

/// JSON body with the `X-Cache` header
pub fn cached_json<T: Serialize>(status: CacheStatus, body: T) -> Response {
    (
        [(X_CACHE, HeaderValue::from_static(status.as_str()))],
        Json(body),
    )
        .into_response()
}

/// `301 Moved Permanently` to `location`
///
/// Built by hand: axum's `Redirect::permanent` answers 308.
pub fn moved_permanently(location: &str, suggestion: bool) -> ApiResult<Response> {
    let location = HeaderValue::try_from(location)
        .map_err(|e| ApiError::Internal(format!("Invalid redirect target '{}': {}", location, e)))?;

    let mut response = (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response();
    if suggestion {
        response
            .headers_mut()
            .insert(X_SLUG_RESOLUTION, HeaderValue::from_static("suggestion"));
    }
    Ok(response)
}

/// Path prefix the request arrived under (`/api` or the root)
pub fn route_base(uri: &Uri) -> &'static str {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        "/api"
    } else {
        ""
    }
}
