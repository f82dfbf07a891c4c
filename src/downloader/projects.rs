//! Catalog import, CRUD and listing.

use crate::db::{NewProject, Project, ProjectFilter, ProjectUpdate, Report};
use crate::error::{Error, Result};
use crate::extractor::ProjectMetadata;
use crate::types::Event;
use serde::Serialize;
use utoipa::ToSchema;

use super::ReportDownloader;

/// Outcome of importing a project from its portal URL
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct FetchedProject {
    /// Stored catalog record
    pub project: Project,
    /// Metadata as extracted
    pub metadata: ProjectMetadata,
    /// An existing record was updated instead of inserted
    pub updated: bool,
}

/// A project with its reports, newest first
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ProjectDetail {
    /// Catalog record
    #[serde(flatten)]
    pub project: Project,
    /// Attached reports
    pub reports: Vec<Report>,
}

/// One page of a project listing
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ProjectPage {
    /// Projects on this page
    pub projects: Vec<Project>,
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub per_page: u32,
    /// Matches across all pages
    pub total: i64,
    /// Number of pages
    pub total_pages: i64,
}

impl ReportDownloader {
    /// Import the project behind a portal URL
    ///
    /// Extracts metadata, updates the record matching the portal id (or the
    /// URL) or inserts a new one, and records the URL in search history.
    pub async fn fetch_project(&self, url: &str) -> Result<FetchedProject> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::Validation("url must not be empty".to_string()));
        }

        let metadata = self.extractor.extract(url).await?;
        let new_project = NewProject::from(metadata.clone());

        let existing = self
            .db
            .find_existing_project(new_project.nsfc_id.as_deref(), Some(url))
            .await?;

        let (project, updated) = match existing {
            Some(existing) => {
                let update = ProjectUpdate::from(new_project);
                let project = self
                    .db
                    .update_project(&existing.id, &update)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("project {}", existing.id)))?;
                (project, true)
            }
            None => (self.db.insert_project(&new_project).await?, false),
        };

        self.db.record_search("url", url, 1).await?;

        tracing::info!(
            project_id = %project.id,
            nsfc_id = ?project.nsfc_id,
            updated,
            "project imported"
        );
        self.emit_event(Event::ProjectImported {
            project_id: project.id.clone(),
            updated,
        });

        Ok(FetchedProject {
            project,
            metadata,
            updated,
        })
    }

    /// Create a project by hand
    ///
    /// Title, approval number and unit are required.
    pub async fn create_project(&self, project: NewProject) -> Result<Project> {
        let required = [
            ("title", Some(project.title.as_str())),
            ("approval_number", project.approval_number.as_deref()),
            ("unit", project.unit.as_deref()),
        ];
        for (field, value) in required {
            if value.is_none_or(|v| v.trim().is_empty()) {
                return Err(Error::Validation(format!("{} must not be empty", field)));
            }
        }

        let project = self.db.insert_project(&project).await?;
        tracing::info!(project_id = %project.id, "project created");
        Ok(project)
    }

    /// Project with its reports
    pub async fn get_project(&self, id: &str) -> Result<ProjectDetail> {
        let project = self.require_project(id).await?;
        let reports = self.db.list_reports(id).await?;
        Ok(ProjectDetail { project, reports })
    }

    /// Partially update a project
    pub async fn update_project(&self, id: &str, update: &ProjectUpdate) -> Result<Project> {
        self.db
            .update_project(id, update)
            .await?
            .ok_or_else(|| Error::NotFound(format!("project {}", id)))
    }

    /// Filtered, paginated listing; filtered queries land in search history
    pub async fn list_projects(&self, filter: &ProjectFilter) -> Result<ProjectPage> {
        let (projects, total) = self.db.list_projects(filter).await?;

        let unit = filter.unit.as_deref().filter(|s| !s.is_empty());
        let code = filter.code.as_deref().filter(|s| !s.is_empty());
        if let Some(unit) = unit {
            self.db.record_search("unit", unit, total).await?;
        } else if let Some(code) = code {
            self.db.record_search("code", code, total).await?;
        }

        let per_page = filter.per_page.max(1);
        Ok(ProjectPage {
            projects,
            page: filter.page.max(1),
            per_page,
            total,
            total_pages: (total + i64::from(per_page) - 1) / i64::from(per_page),
        })
    }

    /// Delete a project, its report records and their files
    pub async fn delete_project(&self, id: &str) -> Result<()> {
        self.require_project(id).await?;

        if let Some(token) = self.builds.lock().get(id) {
            token.cancel();
        }

        for report in self.db.list_reports(id).await? {
            remove_report_file(&report.file_path).await;
        }
        self.db.delete_project(id).await?;

        tracing::info!(project_id = %id, "project deleted");
        self.emit_event(Event::ProjectDeleted {
            project_id: id.to_string(),
        });
        Ok(())
    }

    pub(crate) async fn require_project(&self, id: &str) -> Result<Project> {
        self.db
            .get_project(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("project {}", id)))
    }
}

/// Remove a report file; a missing or undeletable file is logged, not fatal
pub(crate) async fn remove_report_file(path: &str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path, "report file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!(path, error = %e, "failed to remove report file"),
    }
}
