//! Search and category endpoints

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Response,
};
use serde::{Deserialize, Serialize};

use super::dishes::query_params;
use super::response::{cached_json, ApiResponse};
use crate::error::ApiResult;
use crate::pagination::{calculate_pagination, PageMeta};
use crate::AppState;
use pairing_common::db::Dish;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// `{success, data, pagination: {page, limit, total}}`
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub data: Vec<Dish>,
    pub pagination: PageMeta,
}

/// GET /search?q=&page=&limit=
///
/// 400 when `q` is shorter than two characters.
pub async fn search(
    State(state): State<AppState>,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Response> {
    let params = query_params(query)?;
    let page = calculate_pagination(params.page, params.limit);

    let results = state.repo.search(&params.q, page).await?;
    let body = SearchResponse {
        success: true,
        pagination: page.meta(results.value.total),
        data: results.value.dishes,
    };
    Ok(cached_json(results.status, body))
}

/// GET /categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Response> {
    let categories = state.repo.list_categories().await?;
    Ok(cached_json(categories.status, ApiResponse::ok(categories.value)))
}
