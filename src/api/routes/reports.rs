//! Report file handlers.

use crate::api::AppState;
use crate::error::ApiError;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// POST /reports/upload - Upload a PDF for a project
///
/// Multipart fields: `project_id` and `file`.
#[utoipa::path(
    post,
    path = "/api/v1/reports/upload",
    tag = "reports",
    request_body(content = Vec<u8>, description = "PDF upload (multipart/form-data with `project_id` and `file`)", content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Report stored", body = crate::db::Report),
        (status = 400, description = "Missing field or not a PDF", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError),
        (status = 413, description = "Upload too large")
    )
)]
pub async fn upload_report(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut project_id: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (
                    e.status(),
                    Json(ApiError::validation(format!("invalid multipart body: {}", e.body_text()))),
                )
                    .into_response();
            }
        };

        match field.name().unwrap_or("") {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => content = Some(bytes.to_vec()),
                    Err(e) => {
                        return (
                            e.status(),
                            Json(ApiError::validation(format!("failed to read file: {}", e.body_text()))),
                        )
                            .into_response();
                    }
                }
            }
            "project_id" => {
                if let Ok(text) = field.text().await {
                    project_id = Some(text.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let Some(project_id) = project_id.filter(|id| !id.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::validation("missing project_id")),
        )
            .into_response();
    };
    let Some(content) = content else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::validation("no file selected")),
        )
            .into_response();
    };

    match state
        .downloader
        .upload_report(&project_id, file_name.as_deref().unwrap_or(""), content)
        .await
    {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /reports/:id/download - Serve a report file inline
#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}/download",
    tag = "reports",
    params(
        ("id" = String, Path, description = "Report ID")
    ),
    responses(
        (status = 200, description = "PDF document", content_type = "application/pdf"),
        (status = 404, description = "Report or file not found", body = ApiError)
    )
)]
pub async fn download_report_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let (report, path) = match state.downloader.report_file(&id).await {
        Ok(found) => found,
        Err(e) => return e.into_response(),
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => return crate::Error::Io(e).into_response(),
    };

    let disposition = format!(
        "inline; filename*=UTF-8''{}",
        urlencoding::encode(&report.filename)
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response()
}

/// DELETE /reports/:id - Delete a report and its file
#[utoipa::path(
    delete,
    path = "/api/v1/reports/{id}",
    tag = "reports",
    params(
        ("id" = String, Path, description = "Report ID")
    ),
    responses(
        (status = 204, description = "Report deleted"),
        (status = 404, description = "Report not found", body = ApiError)
    )
)]
pub async fn delete_report(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.downloader.delete_report(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
