//! Search history.

use crate::{Error, Result};

use super::{Database, SearchEntry};

impl Database {
    /// Record a search and return its row id
    pub async fn record_search(
        &self,
        search_type: &str,
        keyword: &str,
        results_count: i64,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO search_history (keyword, search_type, results_count, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(keyword)
        .bind(search_type)
        .bind(results_count)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent searches first
    pub async fn list_search_history(&self, limit: u32) -> Result<Vec<SearchEntry>> {
        sqlx::query_as::<_, SearchEntry>(
            r#"
            SELECT id, keyword, search_type, results_count, created_at
            FROM search_history
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)
    }

    /// Remove all search history; returns the number of rows deleted
    pub async fn clear_search_history(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM search_history")
            .execute(&self.pool)
            .await
            .map_err(Error::Sqlx)?;
        Ok(result.rows_affected())
    }
}
