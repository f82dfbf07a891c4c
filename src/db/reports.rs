//! Report records attached to projects.

use crate::{Error, Result};

use super::{Database, NewReport, Report};

impl Database {
    /// Register a report file for a project
    pub async fn create_report_record(&self, report: &NewReport) -> Result<Report> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO reports (id, project_id, filename, file_path, file_size, page_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&report.project_id)
        .bind(&report.filename)
        .bind(&report.file_path)
        .bind(report.file_size)
        .bind(report.page_count)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(Report {
            id,
            project_id: report.project_id.clone(),
            filename: report.filename.clone(),
            file_path: report.file_path.clone(),
            file_size: report.file_size,
            page_count: report.page_count,
            created_at: now,
        })
    }

    /// Get a report by id
    pub async fn get_report(&self, id: &str) -> Result<Option<Report>> {
        sqlx::query_as::<_, Report>(
            r#"
            SELECT id, project_id, filename, file_path, file_size, page_count, created_at
            FROM reports WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Sqlx)
    }

    /// Reports of a project, newest first
    pub async fn list_reports(&self, project_id: &str) -> Result<Vec<Report>> {
        sqlx::query_as::<_, Report>(
            r#"
            SELECT id, project_id, filename, file_path, file_size, page_count, created_at
            FROM reports
            WHERE project_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)
    }

    /// Delete a report record; returns false if the id is unknown
    pub async fn delete_report(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reports WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Sqlx)?;
        Ok(result.rows_affected() > 0)
    }
}
