//! Project catalog operations.

use crate::{Error, Result};

use super::{Database, NewProject, Project, ProjectFilter, ProjectUpdate};

const PROJECT_COLUMNS: &str = r#"
    id, nsfc_id, title, approval_number, application_code, leader, unit,
    start_date, end_date, funding, abstract_text, conclusion_abstract, url,
    created_at, updated_at
"#;

impl Database {
    /// Insert a project and return the stored record
    pub async fn insert_project(&self, project: &NewProject) -> Result<Project> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO projects (
                id, nsfc_id, title, approval_number, application_code, leader, unit,
                start_date, end_date, funding, abstract_text, conclusion_abstract, url,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&project.nsfc_id)
        .bind(&project.title)
        .bind(&project.approval_number)
        .bind(&project.application_code)
        .bind(&project.leader)
        .bind(&project.unit)
        .bind(&project.start_date)
        .bind(&project.end_date)
        .bind(project.funding)
        .bind(&project.abstract_text)
        .bind(&project.conclusion_abstract)
        .bind(&project.url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        self.get_project(&id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("project {} vanished after insert", id)))
    }

    /// Get a project by catalog id
    pub async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let sql = format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS);
        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Sqlx)
    }

    /// Apply a partial update; returns the updated record, or `None` if the id is unknown
    pub async fn update_project(&self, id: &str, update: &ProjectUpdate) -> Result<Option<Project>> {
        let result = sqlx::query(
            r#"
            UPDATE projects SET
                nsfc_id = COALESCE(?, nsfc_id),
                title = COALESCE(?, title),
                approval_number = COALESCE(?, approval_number),
                application_code = COALESCE(?, application_code),
                leader = COALESCE(?, leader),
                unit = COALESCE(?, unit),
                start_date = COALESCE(?, start_date),
                end_date = COALESCE(?, end_date),
                funding = COALESCE(?, funding),
                abstract_text = COALESCE(?, abstract_text),
                conclusion_abstract = COALESCE(?, conclusion_abstract),
                url = COALESCE(?, url),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.nsfc_id)
        .bind(&update.title)
        .bind(&update.approval_number)
        .bind(&update.application_code)
        .bind(&update.leader)
        .bind(&update.unit)
        .bind(&update.start_date)
        .bind(&update.end_date)
        .bind(update.funding)
        .bind(&update.abstract_text)
        .bind(&update.conclusion_abstract)
        .bind(&update.url)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_project(id).await
    }

    /// Find the record an import should update: by portal id first, then by URL
    pub async fn find_existing_project(
        &self,
        nsfc_id: Option<&str>,
        url: Option<&str>,
    ) -> Result<Option<Project>> {
        if let Some(nsfc_id) = nsfc_id.filter(|s| !s.is_empty()) {
            let sql = format!(
                "SELECT {} FROM projects WHERE nsfc_id = ? ORDER BY created_at ASC LIMIT 1",
                PROJECT_COLUMNS
            );
            let found = sqlx::query_as::<_, Project>(&sql)
                .bind(nsfc_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Sqlx)?;
            if found.is_some() {
                return Ok(found);
            }
        }

        if let Some(url) = url.filter(|s| !s.is_empty()) {
            let sql = format!(
                "SELECT {} FROM projects WHERE url = ? ORDER BY created_at ASC LIMIT 1",
                PROJECT_COLUMNS
            );
            return sqlx::query_as::<_, Project>(&sql)
                .bind(url)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Sqlx);
        }

        Ok(None)
    }

    /// One page of projects matching `filter`, newest first, plus the total match count
    pub async fn list_projects(&self, filter: &ProjectFilter) -> Result<(Vec<Project>, i64)> {
        let unit = filter.unit.as_deref().filter(|s| !s.is_empty()).map(like_pattern);
        let code = filter.code.as_deref().filter(|s| !s.is_empty()).map(like_pattern);
        let per_page = i64::from(filter.per_page.max(1));
        let offset = i64::from(filter.page.max(1) - 1) * per_page;

        let sql = format!(
            r#"
            SELECT {}
            FROM projects
            WHERE (? IS NULL OR unit LIKE ?)
              AND (? IS NULL OR application_code LIKE ?)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
            PROJECT_COLUMNS
        );
        let projects = sqlx::query_as::<_, Project>(&sql)
            .bind(&unit)
            .bind(&unit)
            .bind(&code)
            .bind(&code)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Sqlx)?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM projects
            WHERE (? IS NULL OR unit LIKE ?)
              AND (? IS NULL OR application_code LIKE ?)
            "#,
        )
        .bind(&unit)
        .bind(&unit)
        .bind(&code)
        .bind(&code)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok((projects, total))
    }

    /// Delete a project; its report records go with it
    ///
    /// Returns false if the id is unknown. Report files on disk are the caller's concern.
    pub async fn delete_project(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Sqlx)?;
        Ok(result.rows_affected() > 0)
    }
}

fn like_pattern(s: &str) -> String {
    format!("%{}%", s)
}
