//! REST API server module
//!
//! Provides an OpenAPI 3.1 compliant REST API for the project catalog,
//! report builds with live progress, report files and search history.

use crate::{Config, ReportDownloader, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Projects
/// - `POST /projects/fetch` - Import a project from its portal URL
/// - `GET /projects` - List projects (unit/code filters, pagination)
/// - `POST /projects` - Create a project by hand
/// - `GET /projects/:id` - Project with its reports
/// - `PUT /projects/:id` - Update a project
/// - `DELETE /projects/:id` - Delete a project and its report files
///
/// ## Report builds
/// - `GET|POST /projects/:id/download-report` - Build with a server-sent event progress stream
/// - `POST /projects/:id/download-report-simple` - Build and return the final result
/// - `POST /projects/:id/download-report/cancel` - Cancel a running build
///
/// ## Reports
/// - `POST /reports/upload` - Upload a PDF for a project (multipart)
/// - `GET /reports/:id/download` - Serve a report file
/// - `DELETE /reports/:id` - Delete a report and its file
///
/// ## Search history
/// - `GET /search/history` - Recent searches
/// - `DELETE /search/history` - Clear search history
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
/// - `GET /events` - Server-sent events stream of all report events
pub fn create_router(downloader: Arc<ReportDownloader>, config: Arc<Config>) -> Router {
    let state = AppState::new(downloader, config.clone());

    let router = Router::new()
        // Projects
        .route("/projects/fetch", post(routes::fetch_project))
        .route("/projects", get(routes::list_projects))
        .route("/projects", post(routes::create_project))
        .route("/projects/:id", get(routes::get_project))
        .route("/projects/:id", put(routes::update_project))
        .route("/projects/:id", delete(routes::delete_project))
        // Report builds
        .route(
            "/projects/:id/download-report",
            get(routes::download_report_stream).post(routes::download_report_stream),
        )
        .route(
            "/projects/:id/download-report-simple",
            post(routes::download_report_simple),
        )
        .route(
            "/projects/:id/download-report/cancel",
            post(routes::cancel_report_build),
        )
        // Reports
        .route(
            "/reports/upload",
            post(routes::upload_report).layer(DefaultBodyLimit::max(config.api.max_upload_bytes)),
        )
        .route("/reports/:id/download", get(routes::download_report_file))
        .route("/reports/:id", delete(routes::delete_report))
        // Search history
        .route("/search/history", get(routes::get_search_history))
        .route("/search/history", delete(routes::clear_search_history))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // Merge Swagger UI routes if enabled in config (before applying state)
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins ("*" allows any origin)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server stops with an error. Use [`serve_with_shutdown`]
/// to stop on a signal.
///
/// # Example
///
/// ```no_run
/// use nsfc_report_dl::{Config, ReportDownloader};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let downloader = Arc::new(ReportDownloader::new((*config).clone()).await?);
///
/// // Start API server (blocks until shutdown)
/// nsfc_report_dl::api::start_api_server(downloader, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(downloader: Arc<ReportDownloader>, config: Arc<Config>) -> Result<()> {
    serve_with_shutdown(downloader, config, std::future::pending()).await
}

/// Serve the API until `shutdown` resolves, then drain in-flight requests
pub async fn serve_with_shutdown<F>(
    downloader: Arc<ReportDownloader>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(downloader, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
