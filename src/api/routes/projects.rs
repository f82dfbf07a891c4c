//! Project catalog handlers.

use super::{FetchProjectRequest, FetchProjectResponse, ListProjectsQuery, ProjectRequest};
use crate::api::AppState;
use crate::db::{NewProject, ProjectFilter, ProjectUpdate};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

const MAX_PER_PAGE: u32 = 100;

/// POST /projects/fetch - Import a project from its portal URL
#[utoipa::path(
    post,
    path = "/api/v1/projects/fetch",
    tag = "projects",
    request_body = FetchProjectRequest,
    responses(
        (status = 200, description = "Project imported", body = FetchProjectResponse),
        (status = 400, description = "Invalid URL or no project identifier", body = crate::error::ApiError),
        (status = 502, description = "Portal unavailable", body = crate::error::ApiError)
    )
)]
pub async fn fetch_project(
    State(state): State<AppState>,
    Json(request): Json<FetchProjectRequest>,
) -> Response {
    match state.downloader.fetch_project(&request.url).await {
        Ok(fetched) => {
            let response = FetchProjectResponse {
                success: true,
                project_id: fetched.project.id,
                updated: fetched.updated,
                data: fetched.metadata,
                need_download_report: request.auto_download.then_some(true),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /projects - List projects
#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "projects",
    params(ListProjectsQuery),
    responses(
        (status = 200, description = "One page of projects", body = crate::downloader::ProjectPage),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> Response {
    let defaults = ProjectFilter::default();
    let filter = ProjectFilter {
        unit: query.unit,
        code: query.code,
        page: query.page.unwrap_or(defaults.page).max(1),
        per_page: query
            .per_page
            .unwrap_or(defaults.per_page)
            .clamp(1, MAX_PER_PAGE),
    };

    match state.downloader.list_projects(&filter).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /projects - Create a project by hand
#[utoipa::path(
    post,
    path = "/api/v1/projects",
    tag = "projects",
    request_body = ProjectRequest,
    responses(
        (status = 201, description = "Project created", body = crate::db::Project),
        (status = 400, description = "Missing title, approval number or unit", body = crate::error::ApiError)
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<ProjectRequest>,
) -> Response {
    match state.downloader.create_project(NewProject::from(request)).await {
        Ok(project) => (StatusCode::CREATED, Json(project)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /projects/:id - Project with its reports
#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    tag = "projects",
    params(
        ("id" = String, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Project with reports", body = crate::downloader::ProjectDetail),
        (status = 404, description = "Project not found", body = crate::error::ApiError)
    )
)]
pub async fn get_project(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.downloader.get_project(&id).await {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// PUT /projects/:id - Update a project
#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}",
    tag = "projects",
    params(
        ("id" = String, Path, description = "Project ID")
    ),
    request_body = ProjectRequest,
    responses(
        (status = 200, description = "Updated project", body = crate::db::Project),
        (status = 404, description = "Project not found", body = crate::error::ApiError)
    )
)]
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ProjectRequest>,
) -> Response {
    let update = ProjectUpdate::from(request);
    match state.downloader.update_project(&id, &update).await {
        Ok(project) => (StatusCode::OK, Json(project)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /projects/:id - Delete a project and its report files
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}",
    tag = "projects",
    params(
        ("id" = String, Path, description = "Project ID")
    ),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 404, description = "Project not found", body = crate::error::ApiError)
    )
)]
pub async fn delete_project(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.downloader.delete_project(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
