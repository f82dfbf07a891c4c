//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`projects`]: Catalog import and CRUD
//! - [`builds`]: Report builds (streamed, synchronous, cancel)
//! - [`reports`]: Report upload, download, deletion
//! - [`search`]: Search history
//! - [`system`]: Health, events, OpenAPI

use serde::{Deserialize, Serialize};

mod builds;
mod projects;
mod reports;
mod search;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use builds::*;
pub use projects::*;
pub use reports::*;
pub use search::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /projects/fetch
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct FetchProjectRequest {
    /// Portal project page URL
    pub url: String,
    /// Ask the client to start a report build afterwards
    #[serde(default)]
    pub auto_download: bool,
}

/// Response for POST /projects/fetch
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FetchProjectResponse {
    /// Always true
    pub success: bool,
    /// Catalog id of the imported project
    pub project_id: String,
    /// Whether an existing record was updated
    pub updated: bool,
    /// Extracted metadata
    pub data: crate::extractor::ProjectMetadata,
    /// Present and true when `auto_download` was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub need_download_report: Option<bool>,
}

/// Query parameters for GET /projects
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListProjectsQuery {
    /// Substring of the host institution
    pub unit: Option<String>,
    /// Substring of the application code
    pub code: Option<String>,
    /// 1-based page number (default: 1)
    pub page: Option<u32>,
    /// Page size (default: 20, max: 100)
    pub per_page: Option<u32>,
}

/// Request body for POST /projects and PUT /projects/:id
///
/// On update, absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ProjectRequest {
    /// 32-hex portal identifier
    pub nsfc_id: Option<String>,
    /// Project title (required on create)
    pub title: Option<String>,
    /// Approval number (required on create)
    pub approval_number: Option<String>,
    /// Application code
    pub application_code: Option<String>,
    /// Principal investigator
    pub leader: Option<String>,
    /// Host institution (required on create)
    pub unit: Option<String>,
    /// Research period start
    pub start_date: Option<String>,
    /// Research period end
    pub end_date: Option<String>,
    /// Funding in units of 10k CNY
    pub funding: Option<f64>,
    /// Project abstract
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Closing-report abstract
    pub conclusion_abstract: Option<String>,
    /// Portal page URL
    pub url: Option<String>,
}

impl From<ProjectRequest> for crate::db::NewProject {
    fn from(r: ProjectRequest) -> Self {
        Self {
            nsfc_id: r.nsfc_id,
            title: r.title.unwrap_or_default(),
            approval_number: r.approval_number,
            application_code: r.application_code,
            leader: r.leader,
            unit: r.unit,
            start_date: r.start_date,
            end_date: r.end_date,
            funding: r.funding,
            abstract_text: r.abstract_text,
            conclusion_abstract: r.conclusion_abstract,
            url: r.url,
        }
    }
}

impl From<ProjectRequest> for crate::db::ProjectUpdate {
    fn from(r: ProjectRequest) -> Self {
        Self {
            nsfc_id: r.nsfc_id,
            title: r.title,
            approval_number: r.approval_number,
            application_code: r.application_code,
            leader: r.leader,
            unit: r.unit,
            start_date: r.start_date,
            end_date: r.end_date,
            funding: r.funding,
            abstract_text: r.abstract_text,
            conclusion_abstract: r.conclusion_abstract,
            url: r.url,
        }
    }
}

/// Query parameters for GET /search/history
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchHistoryQuery {
    /// Maximum number of entries (default: 10, max: 1000)
    pub limit: Option<u32>,
}
