//! Dish read endpoints
//!
//! Single-dish and pairing reads go through the slug resolver: a canonical
//! slug is served directly, anything else is answered with a 301 to the
//! canonical URL.

use axum::{
    extract::{rejection::QueryRejection, OriginalUri, Path, Query, State},
    response::Response,
};
use pairing_common::db::{DishPairings, DishType};
use serde::Deserialize;
use serde_json::json;

use super::response::{cached_json, moved_permanently, route_base, ApiResponse};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{clamp_limit, DEFAULT_LIMIT, MAX_LIMIT};
use crate::popularity::{DEFAULT_POPULAR_LIMIT, MAX_POPULAR_LIMIT};
use crate::slug::Resolution;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(rename = "type")]
    pub dish_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PopularParams {
    pub limit: Option<i64>,
}

pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(params)| params)
        .map_err(|e| ApiError::validation(e.body_text()))
}

/// GET /dishes?type=&limit=&offset=
///
/// Returns `{dishes, total}`.
pub async fn list_dishes(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Response> {
    let params = query_params(query)?;

    let dish_type = params
        .dish_type
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(str::parse::<DishType>)
        .transpose()?;
    let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let page = state.repo.list_dishes(dish_type, limit, offset).await?;
    Ok(cached_json(page.status, page.value))
}

/// GET /dishes/popular?limit=
pub async fn popular_dishes(
    State(state): State<AppState>,
    query: Result<Query<PopularParams>, QueryRejection>,
) -> ApiResult<Response> {
    let params = query_params(query)?;
    let limit = clamp_limit(params.limit, DEFAULT_POPULAR_LIMIT, MAX_POPULAR_LIMIT);

    let popular = state.popularity.popular_dishes(limit).await?;
    Ok(cached_json(popular.status, ApiResponse::ok(popular.value)))
}

/// GET /dishes/:slug
pub async fn get_dish(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(slug): Path<String>,
) -> ApiResult<Response> {
    let base = route_base(&uri);

    match state.resolver.resolve(&slug).await? {
        Resolution::Found {
            dish,
            redirect: false,
            status,
        } => Ok(cached_json(status, ApiResponse::ok(dish))),
        Resolution::Found { dish, .. } => {
            moved_permanently(&format!("{}/dishes/{}", base, dish.dish.slug), false)
        }
        Resolution::Suggested { dish } => {
            moved_permanently(&format!("{}/dishes/{}", base, dish.slug), true)
        }
        Resolution::NotFound => Err(not_found(&slug)),
    }
}

/// GET /dishes/:slug/pairings
///
/// Counts a view of the main dish without waiting for the write.
pub async fn get_pairings(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(slug): Path<String>,
) -> ApiResult<Response> {
    let base = route_base(&uri);

    let main = match state.resolver.resolve(&slug).await? {
        Resolution::Found {
            dish,
            redirect: false,
            ..
        } => dish.dish,
        Resolution::Found { dish, .. } => {
            return moved_permanently(&format!("{}/dishes/{}/pairings", base, dish.dish.slug), false)
        }
        Resolution::Suggested { dish } => {
            return moved_permanently(&format!("{}/dishes/{}/pairings", base, dish.slug), true)
        }
        Resolution::NotFound => return Err(not_found(&slug)),
    };

    let sides = state.repo.get_pairings_for_dish(&main).await?;

    // Analytics only: the response never waits on this write
    drop(state.popularity.spawn_record_view(main.id));

    let body = DishPairings {
        main_dish: main,
        side_dishes: sides.value,
    };
    Ok(cached_json(sides.status, json!({ "success": true, "data": body })))
}

pub(crate) fn not_found(slug: &str) -> ApiError {
    ApiError::NotFound(format!("Dish '{}' not found", slug))
}
