//! Report files: upload, lookup, deletion.

use crate::db::{NewReport, Report};
use crate::error::{Error, Result};
use crate::report::document::REPORT_EXTENSION;
use crate::utils::{
    create_unique_file, replace_illegal_chars, truncate_chars, try_create_new, unix_timestamp,
    write_claimed,
};
use std::path::PathBuf;

use super::ReportDownloader;
use super::projects::remove_report_file;

/// Longest title fragment used in an uploaded report's filename
const UPLOAD_TITLE_MAX_CHARS: usize = 50;

/// Leading bytes of every PDF file
const PDF_MAGIC: &[u8] = b"%PDF";

impl ReportDownloader {
    /// Store an uploaded PDF for a project and register it
    ///
    /// The file is renamed `{code}_{title}_{approval_number}.pdf`; when that
    /// name is taken the approval number is replaced by the current unix time.
    pub async fn upload_report(
        &self,
        project_id: &str,
        original_filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Report> {
        if original_filename.trim().is_empty() {
            return Err(Error::Validation("no file selected".to_string()));
        }
        let is_pdf_name = std::path::Path::new(original_filename)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(REPORT_EXTENSION));
        if !is_pdf_name || !bytes.starts_with(PDF_MAGIC) {
            return Err(Error::Validation("only PDF files are accepted".to_string()));
        }

        let project = self.require_project(project_id).await?;

        let code = replace_illegal_chars(
            project
                .application_code
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or("unknown_code"),
        );
        let title = replace_illegal_chars(project.title.trim());
        let title = truncate_chars(&title, UPLOAD_TITLE_MAX_CHARS);
        let approval = replace_illegal_chars(
            project
                .approval_number
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or("unknown_approval"),
        );

        let dir = &self.config.persistence.upload_dir;
        tokio::fs::create_dir_all(dir).await?;

        let preferred = dir.join(format!("{}_{}_{}.{}", code, title, approval, REPORT_EXTENSION));
        let (path, file) = match try_create_new(&preferred).await? {
            Some(file) => (preferred, file),
            None => {
                let fallback = format!("{}_{}_{}.{}", code, title, unix_timestamp(), REPORT_EXTENSION);
                create_unique_file(&dir.join(fallback)).await?
            }
        };
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let page_count = count_pages(&bytes);
        write_claimed(&path, file, &bytes).await?;

        let record = NewReport {
            project_id: project.id.clone(),
            filename,
            file_path: path.to_string_lossy().into_owned(),
            file_size: i64::try_from(bytes.len()).unwrap_or(i64::MAX),
            page_count,
        };
        let report = match self.db.create_report_record(&record).await {
            Ok(report) => report,
            Err(e) => {
                remove_report_file(&record.file_path).await;
                return Err(e);
            }
        };

        tracing::info!(
            project_id = %project.id,
            report_id = %report.id,
            filename = %report.filename,
            size = report.file_size,
            "report uploaded"
        );
        Ok(report)
    }

    /// Report record plus the on-disk path of its file
    ///
    /// [`Error::NotFound`] if either the record or the file is missing.
    pub async fn report_file(&self, report_id: &str) -> Result<(Report, PathBuf)> {
        let report = self.require_report(report_id).await?;
        let path = PathBuf::from(&report.file_path);
        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::NotFound(format!("file of report {}", report_id)));
        }
        Ok((report, path))
    }

    /// Delete a report record and its file
    pub async fn delete_report(&self, report_id: &str) -> Result<()> {
        let report = self.require_report(report_id).await?;
        remove_report_file(&report.file_path).await;
        self.db.delete_report(report_id).await?;
        tracing::info!(report_id, project_id = %report.project_id, "report deleted");
        Ok(())
    }

    async fn require_report(&self, report_id: &str) -> Result<Report> {
        self.db
            .get_report(report_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("report {}", report_id)))
    }
}

/// Page count of a PDF, if it parses
fn count_pages(bytes: &[u8]) -> Option<i64> {
    match lopdf::Document::load_mem(bytes) {
        Ok(doc) => i64::try_from(doc.get_pages().len()).ok(),
        Err(e) => {
            tracing::debug!(error = %e, "uploaded PDF could not be parsed for a page count");
            None
        }
    }
}
