//! Database layer for nsfc-report-dl
//!
//! Handles SQLite persistence for the project catalog, report records and
//! search history.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`projects`]: Project CRUD, upsert lookup, filtered listing
//! - [`reports`]: Report records attached to projects
//! - [`search`]: Search history

use serde::Serialize;
use sqlx::{FromRow, sqlite::SqlitePool};
use utoipa::ToSchema;

use crate::extractor::ProjectMetadata;
use crate::utils::extract_upstream_id;

mod migrations;
mod projects;
mod reports;
mod search;

/// Project record from database
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, ToSchema)]
pub struct Project {
    /// Catalog id (UUID)
    pub id: String,
    /// 32-hex portal identifier
    pub nsfc_id: Option<String>,
    /// Project title
    pub title: String,
    /// Approval number
    pub approval_number: Option<String>,
    /// Application code
    pub application_code: Option<String>,
    /// Principal investigator
    pub leader: Option<String>,
    /// Host institution
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
    /// Unix timestamp of creation
    pub created_at: i64,
    /// Unix timestamp of the last update
    pub updated_at: i64,
}

impl Project {
    /// Portal identifier, falling back to the one embedded in the URL
    pub fn upstream_id(&self) -> Option<String> {
        self.nsfc_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| self.url.as_deref().and_then(extract_upstream_id))
    }
}

/// New project to be inserted into the database
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    /// Portal identifier
    pub nsfc_id: Option<String>,
    /// Project title
    pub title: String,
    /// Approval number
    pub approval_number: Option<String>,
    /// Application code
    pub application_code: Option<String>,
    /// Principal investigator
    pub leader: Option<String>,
    /// Host institution
    pub unit: Option<String>,
    /// Research period start
    pub start_date: Option<String>,
    /// Research period end
    pub end_date: Option<String>,
    /// Funding in units of 10k CNY
    pub funding: Option<f64>,
    /// Project abstract
    pub abstract_text: Option<String>,
    /// Closing-report abstract
    pub conclusion_abstract: Option<String>,
    /// Portal page URL
    pub url: Option<String>,
}

impl From<ProjectMetadata> for NewProject {
    fn from(meta: ProjectMetadata) -> Self {
        let title = meta
            .title
            .clone()
            .or_else(|| meta.nsfc_id.as_ref().map(|id| format!("nsfc_{}", id)))
            .unwrap_or_else(|| meta.url.clone());
        Self {
            nsfc_id: meta.nsfc_id,
            title,
            approval_number: meta.approval_number,
            application_code: meta.application_code,
            leader: meta.leader,
            unit: meta.unit,
            start_date: meta.start_date,
            end_date: meta.end_date,
            funding: meta.funding,
            abstract_text: meta.abstract_text,
            conclusion_abstract: meta.conclusion_abstract,
            url: Some(meta.url),
        }
    }
}

/// Partial update of a project; `None` leaves a column unchanged
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    /// Portal identifier
    pub nsfc_id: Option<String>,
    /// Project title
    pub title: Option<String>,
    /// Approval number
    pub approval_number: Option<String>,
    /// Application code
    pub application_code: Option<String>,
    /// Principal investigator
    pub leader: Option<String>,
    /// Host institution
    pub unit: Option<String>,
    /// Research period start
    pub start_date: Option<String>,
    /// Research period end
    pub end_date: Option<String>,
    /// Funding in units of 10k CNY
    pub funding: Option<f64>,
    /// Project abstract
    pub abstract_text: Option<String>,
    /// Closing-report abstract
    pub conclusion_abstract: Option<String>,
    /// Portal page URL
    pub url: Option<String>,
}

impl From<NewProject> for ProjectUpdate {
    fn from(p: NewProject) -> Self {
        Self {
            nsfc_id: p.nsfc_id,
            title: Some(p.title),
            approval_number: p.approval_number,
            application_code: p.application_code,
            leader: p.leader,
            unit: p.unit,
            start_date: p.start_date,
            end_date: p.end_date,
            funding: p.funding,
            abstract_text: p.abstract_text,
            conclusion_abstract: p.conclusion_abstract,
            url: p.url,
        }
    }
}

/// Listing filter and page selection
#[derive(Debug, Clone)]
pub struct ProjectFilter {
    /// Substring of the host institution
    pub unit: Option<String>,
    /// Substring of the application code
    pub code: Option<String>,
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub per_page: u32,
}

impl Default for ProjectFilter {
    fn default() -> Self {
        Self {
            unit: None,
            code: None,
            page: 1,
            per_page: 20,
        }
    }
}

/// Report record from database
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, ToSchema)]
pub struct Report {
    /// Catalog id (UUID)
    pub id: String,
    /// Owning project
    pub project_id: String,
    /// File name
    pub filename: String,
    /// Full path on disk
    pub file_path: String,
    /// Size in bytes
    pub file_size: i64,
    /// Page count, when built by us
    pub page_count: Option<i64>,
    /// Unix timestamp of creation
    pub created_at: i64,
}

/// New report record to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewReport {
    /// Owning project
    pub project_id: String,
    /// File name
    pub filename: String,
    /// Full path on disk
    pub file_path: String,
    /// Size in bytes
    pub file_size: i64,
    /// Page count, when known
    pub page_count: Option<i64>,
}

/// Search history entry from database
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, ToSchema)]
pub struct SearchEntry {
    /// Row id
    pub id: i64,
    /// What was searched (URL, unit filter, ...)
    pub keyword: String,
    /// Kind of search ("url", "unit", "code")
    pub search_type: String,
    /// Matches found
    pub results_count: i64,
    /// Unix timestamp
    pub created_at: i64,
}

/// Database handle for nsfc-report-dl
pub struct Database {
    pool: SqlitePool,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
