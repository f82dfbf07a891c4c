//! Search history handlers.

use super::SearchHistoryQuery;
use crate::api::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

const DEFAULT_HISTORY_LIMIT: u32 = 10;
const MAX_HISTORY_LIMIT: u32 = 1000;

/// GET /search/history - Recent searches, newest first
#[utoipa::path(
    get,
    path = "/api/v1/search/history",
    tag = "search",
    params(SearchHistoryQuery),
    responses(
        (status = 200, description = "Recent searches", body = Vec<crate::db::SearchEntry>),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn get_search_history(
    State(state): State<AppState>,
    Query(query): Query<SearchHistoryQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    match state.downloader.db.list_search_history(limit).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /search/history - Clear search history
#[utoipa::path(
    delete,
    path = "/api/v1/search/history",
    tag = "search",
    responses(
        (status = 200, description = "History cleared; body holds the number of removed entries"),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn clear_search_history(State(state): State<AppState>) -> Response {
    match state.downloader.db.clear_search_history().await {
        Ok(deleted) => (StatusCode::OK, Json(json!({ "deleted": deleted }))).into_response(),
        Err(e) => e.into_response(),
    }
}
