//! Report build handlers.

use crate::api::AppState;
use crate::error::ApiError;
use crate::types::ReportStreamEvent;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// GET|POST /projects/:id/download-report - Build with live progress
///
/// Each server-sent event carries one JSON object with a `type` field
/// (`start`, `progress`, `complete` or `error`). The stream closes after
/// `complete` or `error`. Rejections before the build starts are plain
/// JSON error responses.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/download-report",
    tag = "builds",
    params(
        ("id" = String, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Progress stream (text/event-stream)", content_type = "text/event-stream"),
        (status = 400, description = "Project has no portal identifier", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError),
        (status = 409, description = "A build for this project is already running", body = ApiError),
        (status = 503, description = "Shutting down", body = ApiError)
    )
)]
pub async fn download_report_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let receiver = match state.downloader.spawn_report_build(&id).await {
        Ok(receiver) => receiver,
        Err(e) => return e.into_response(),
    };

    let stream = UnboundedReceiverStream::new(receiver).filter_map(|event: ReportStreamEvent| {
        match serde_json::to_string(&event) {
            Ok(json_data) => Some(Ok::<_, Infallible>(SseEvent::default().data(json_data))),
            Err(e) => {
                tracing::warn!("Failed to serialize build event to JSON: {}", e);
                None
            }
        }
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// POST /projects/:id/download-report-simple - Build and return the result
#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/download-report-simple",
    tag = "builds",
    params(
        ("id" = String, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Report built and registered", body = crate::downloader::CompletedBuild),
        (status = 404, description = "Project not found", body = ApiError),
        (status = 409, description = "A build for this project is already running", body = ApiError),
        (status = 500, description = "Build produced no document; details hold the build result", body = ApiError)
    )
)]
pub async fn download_report_simple(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.downloader.build_report(&id).await {
        Ok(completed) if completed.result.success => {
            (StatusCode::OK, Json(completed)).into_response()
        }
        Ok(completed) => {
            let mut error = ApiError::new("build_failed", completed.result.message.clone());
            error.error.details = serde_json::to_value(&completed.result).ok();
            (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// POST /projects/:id/download-report/cancel - Cancel a running build
#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/download-report/cancel",
    tag = "builds",
    params(
        ("id" = String, Path, description = "Project ID")
    ),
    responses(
        (status = 202, description = "Cancellation requested"),
        (status = 404, description = "No running build for this project", body = ApiError)
    )
)]
pub async fn cancel_report_build(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.downloader.cancel_build(&id).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => e.into_response(),
    }
}
