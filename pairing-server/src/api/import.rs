//! Import endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::import::ImportRequest;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub main_dish_id: i64,
    pub side_dishes_imported: usize,
    pub pairings_written: usize,
    pub recipes_written: usize,
    pub timestamp: String,
}

/// POST /import-dishes
///
/// Authorization is checked by middleware before this runs. Every failure
/// carries a timestamp for correlation with server logs.
pub async fn import_dishes(
    State(state): State<AppState>,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> ApiResult<Json<ImportResponse>> {
    let Json(request) =
        payload.map_err(|e| ApiError::validation(e.body_text()).into_write())?;

    let summary = state
        .importer
        .import(&request)
        .await
        .map_err(|e| ApiError::from(e).into_write())?;

    Ok(Json(ImportResponse {
        success: true,
        message: format!(
            "Imported '{}' with {} side dishes",
            request.main_dish.name.trim(),
            summary.side_dishes_imported
        ),
        main_dish_id: summary.main_dish_id,
        side_dishes_imported: summary.side_dishes_imported,
        pairings_written: summary.pairings_written,
        recipes_written: summary.recipes_written,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}
