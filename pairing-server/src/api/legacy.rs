//! Legacy routed paths: `/{legacy-prefix}{identifier}`
//!
//! A legacy path is never canonical, so every resolved identifier is
//! redirected to the pairings page of its dish.

use axum::{
    extract::{Path, State},
    response::Response,
};

use super::dishes::not_found;
use super::response::moved_permanently;
use crate::error::ApiResult;
use crate::slug::Resolution;
use crate::AppState;

/// GET /:segment
pub async fn legacy_redirect(
    State(state): State<AppState>,
    Path(segment): Path<String>,
) -> ApiResult<Response> {
    match state.resolver.resolve(&segment).await? {
        Resolution::Found { dish, .. } => {
            moved_permanently(&format!("/dishes/{}/pairings", dish.dish.slug), false)
        }
        Resolution::Suggested { dish } => {
            moved_permanently(&format!("/dishes/{}/pairings", dish.slug), true)
        }
        Resolution::NotFound => Err(not_found(&segment)),
    }
}
