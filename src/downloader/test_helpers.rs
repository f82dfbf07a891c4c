//! Shared test helpers for creating ReportDownloader instances in tests.

use crate::config::{Config, LinearBackoff, RetryConfig};
use crate::db::NewProject;
use crate::downloader::ReportDownloader;
use crate::error::Result;
use crate::extractor::{MetadataExtractor, PROJECT_INFO_PATH, ProjectMetadata};
use crate::report::source::LOCATE_PATH;
use crate::report::document::tests::png_bytes;
use crate::report::{decode_page, encode_pdf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Portal id used by most fixtures
pub(crate) const NSFC_ID: &str = "0123456789abcdef0123456789abcdef";

/// Config with every delay zeroed, talking to `origin`, storing under `dir`
pub(crate) fn fast_config(dir: &std::path::Path, origin: &str) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("test.db");
    config.persistence.upload_dir = dir.join("uploads");

    config.transport.origin = origin.to_string();
    config.transport.retry = RetryConfig {
        max_attempts: 0,
        initial_delay: Duration::from_millis(1),
        jitter: false,
        ..RetryConfig::default()
    };

    config.locator.probe_retry_delay = Duration::ZERO;

    config.fetch.resolve_backoff = LinearBackoff::ZERO;
    config.fetch.download_backoff = LinearBackoff::ZERO;
    config.fetch.page_delay_min = Duration::ZERO;
    config.fetch.page_delay_max = Duration::ZERO;
    config
}

/// Helper to create a test ReportDownloader whose portal is unreachable.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader() -> (ReportDownloader, tempfile::TempDir) {
    create_test_downloader_for("http://127.0.0.1:9").await
}

/// Helper to create a test ReportDownloader talking to a mock portal at `origin`
pub(crate) async fn create_test_downloader_for(
    origin: &str,
) -> (ReportDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = fast_config(temp_dir.path(), origin);
    let downloader = ReportDownloader::new(config).await.unwrap();
    (downloader, temp_dir)
}

/// A catalog project pointing at [`NSFC_ID`]
pub(crate) fn sample_project(title: &str) -> NewProject {
    NewProject {
        nsfc_id: Some(NSFC_ID.to_string()),
        title: title.to_string(),
        approval_number: Some("81970001".to_string()),
        application_code: Some("H0101".to_string()),
        leader: Some("Li Si".to_string()),
        unit: Some("Peking University".to_string()),
        url: Some(format!("https://kd.nsfc.cn/finalDetails?id={}", NSFC_ID)),
        ..NewProject::default()
    }
}

/// Mount a portal serving `pages` report pages for [`NSFC_ID`]
///
/// Page `i` is a PNG `10*i` pixels wide. Every other index answers with a
/// non-success application code.
pub(crate) async fn mount_portal(server: &MockServer, pages: u32, delay: Duration) {
    for index in 1..=pages {
        Mock::given(method("POST"))
            .and(path(LOCATE_PATH))
            .and(body_string(format!("id={}&index={}", NSFC_ID, index)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(delay)
                    .set_body_json(serde_json::json!({
                        "code": 200,
                        "data": { "url": format!("/img/{}.png", index) }
                    })),
            )
            .mount(server)
            .await;

        // No method matcher: answers both downloads and HEAD resource checks
        Mock::given(path(format!("/img/{}.png", index)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(10 * index, 10)))
            .mount(server)
            .await;
    }

    Mock::given(method("POST"))
        .and(path(LOCATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_json(serde_json::json!({ "code": 500, "data": null })),
        )
        .with_priority(10)
        .mount(server)
        .await;
}

/// Mount the project-info endpoint answering with `name`
pub(crate) async fn mount_project_name(server: &MockServer, name: &str) {
    Mock::given(method("POST"))
        .and(path(format!("{}/{}", PROJECT_INFO_PATH, NSFC_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "data": { "projectName": name }
        })))
        .mount(server)
        .await;
}

/// Extractor returning fixed metadata for any URL
pub(crate) struct StaticExtractor(pub(crate) ProjectMetadata);

#[async_trait::async_trait]
impl MetadataExtractor for StaticExtractor {
    async fn extract(&self, url: &str) -> Result<ProjectMetadata> {
        Ok(ProjectMetadata {
            url: url.to_string(),
            ..self.0.clone()
        })
    }
}

/// Downloader whose extractor always returns `metadata`
pub(crate) fn with_static_extractor(
    downloader: ReportDownloader,
    metadata: ProjectMetadata,
) -> ReportDownloader {
    downloader.with_extractor(Arc::new(StaticExtractor(metadata)))
}

/// A valid one-page PDF
pub(crate) fn minimal_pdf() -> Vec<u8> {
    let page = decode_page(1, &png_bytes(20, 30)).unwrap();
    encode_pdf(&[page], 100.0, 90).unwrap()
}
