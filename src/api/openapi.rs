//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the nsfc-report-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the nsfc-report-dl REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "nsfc-report-dl REST API",
        version = "0.1.0",
        description = "REST API for a catalog of NSFC funded projects and their closing reports: import project metadata, assemble closing reports from the public page images, upload and serve report PDFs",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5002/api/v1", description = "Local development server")
    ),
    paths(
        // Projects
        crate::api::routes::fetch_project,
        crate::api::routes::list_projects,
        crate::api::routes::create_project,
        crate::api::routes::get_project,
        crate::api::routes::update_project,
        crate::api::routes::delete_project,

        // Report builds
        crate::api::routes::download_report_stream,
        crate::api::routes::download_report_simple,
        crate::api::routes::cancel_report_build,

        // Reports
        crate::api::routes::upload_report,
        crate::api::routes::download_report_file,
        crate::api::routes::delete_report,

        // Search history
        crate::api::routes::get_search_history,
        crate::api::routes::clear_search_history,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Catalog records
        crate::db::Project,
        crate::db::Report,
        crate::db::SearchEntry,
        crate::extractor::ProjectMetadata,
        crate::downloader::ProjectDetail,
        crate::downloader::ProjectPage,
        crate::downloader::FetchedProject,
        crate::downloader::CompletedBuild,

        // Build types
        crate::types::ReportBuildResult,
        crate::types::FailureKind,
        crate::types::ProgressEvent,
        crate::types::BuildState,
        crate::types::Event,

        // Config types
        crate::config::Config,
        crate::config::TransportConfig,
        crate::config::RetryConfig,
        crate::config::LocatorConfig,
        crate::config::LinearBackoff,
        crate::config::FetchConfig,
        crate::config::PersistenceConfig,
        crate::config::ApiConfig,

        // API request/response types
        crate::api::routes::FetchProjectRequest,
        crate::api::routes::FetchProjectResponse,
        crate::api::routes::ListProjectsQuery,
        crate::api::routes::ProjectRequest,
        crate::api::routes::SearchHistoryQuery,

        // Error types
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "projects", description = "Project catalog - Import from the portal, create, update, list, delete"),
        (name = "builds", description = "Report builds - Assemble closing reports with live progress, cancel running builds"),
        (name = "reports", description = "Reports - Upload, serve and delete report PDFs"),
        (name = "search", description = "Search history - Recent catalog searches and imports"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_has_paths() {
        let spec = ApiDoc::openapi();

        assert!(spec.paths.paths.contains_key("/api/v1/projects"));
        assert!(spec.paths.paths.contains_key("/api/v1/projects/{id}/download-report"));
        assert!(spec.paths.paths.contains_key("/api/v1/reports/upload"));
        assert!(spec.paths.paths.contains_key("/api/v1/search/history"));
    }

    #[test]
    fn test_openapi_spec_has_components() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components should be defined");

        for name in ["Project", "Report", "ReportBuildResult", "ApiError", "Config"] {
            assert!(
                components.schemas.contains_key(name),
                "schema {name} should be defined"
            );
        }
    }

    #[test]
    fn test_openapi_spec_has_tags() {
        let spec = ApiDoc::openapi();
        let tags = spec.tags.expect("tags should be defined");

        let tag_names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        for expected in ["projects", "builds", "reports", "search", "system"] {
            assert!(tag_names.contains(&expected), "missing tag {expected}");
        }
    }

    #[test]
    fn test_openapi_spec_info() {
        let spec = ApiDoc::openapi();

        assert_eq!(spec.info.title, "nsfc-report-dl REST API");
        assert!(spec.info.description.is_some());
    }

    #[test]
    fn test_openapi_json_serialization() {
        let spec = ApiDoc::openapi();

        let json = serde_json::to_value(&spec).expect("Should serialize to JSON");
        let version = json.get("openapi").and_then(|v| v.as_str()).unwrap();
        assert!(version.starts_with("3."), "Should use OpenAPI 3.x version");
    }
}
