//! Core types for nsfc-report-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

use crate::utils::sanitize_display_name;

/// One report build request: upstream project key plus the name the output file is based on
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectReportRequest {
    /// Upstream (portal) project identifier, opaque to us
    pub project_identifier: String,
    /// Filename-safe display name
    pub display_name: String,
}

impl ProjectReportRequest {
    /// Build a request, sanitizing `raw_name` and falling back to `nsfc_{id}` when nothing usable remains
    pub fn new(project_identifier: impl Into<String>, raw_name: Option<&str>) -> Self {
        let project_identifier = project_identifier.into();
        let display_name = sanitize_display_name(raw_name.unwrap_or_default())
            .unwrap_or_else(|| format!("nsfc_{}", project_identifier));
        Self {
            project_identifier,
            display_name,
        }
    }
}

/// Outcome of asking the locating API where a page lives
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageResolution {
    /// Fully-qualified image URL
    Found(String),
    /// The page does not exist; ends the scan
    NotFound,
    /// Worth retrying
    Transient,
}

/// Outcome of downloading a resolved page image
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Raw image bytes
    Bytes(Vec<u8>),
    /// The resource is gone (HTTP 404); ends the scan
    NotFound,
    /// Worth retrying
    Transient,
}

/// A decoded page normalized to 8-bit RGB, bound to its 1-based index
#[derive(Clone, Debug)]
pub struct PageImage {
    /// 1-based page index
    pub index: u32,
    /// Pixel data
    pub image: image::RgbImage,
}

/// Why a build ended without a document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Too many consecutive pages could not be downloaded
    ConnectivityDegraded,
    /// No page produced a usable image
    NoValidImages,
    /// The build was cancelled
    Cancelled,
    /// Unexpected fault (encoding, disk)
    Internal,
}

/// Terminal result of one report build
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportBuildResult {
    /// Whether a document was written
    pub success: bool,
    /// Path of the written document
    #[schema(value_type = Option<String>)]
    pub file_path: Option<PathBuf>,
    /// Filename of the written document
    pub filename: Option<String>,
    /// Pages in the document
    pub page_count: u32,
    /// Size of the document in bytes
    pub file_size: u64,
    /// Human-readable summary
    pub message: String,
    /// Failure classification when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl ReportBuildResult {
    /// A successful build
    pub fn succeeded(file_path: PathBuf, filename: String, page_count: u32, file_size: u64) -> Self {
        Self {
            success: true,
            message: format!("Report assembled: {} pages", page_count),
            file_path: Some(file_path),
            filename: Some(filename),
            page_count,
            file_size,
            failure: None,
        }
    }

    /// A failed build; no document exists
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            file_path: None,
            filename: None,
            page_count: 0,
            file_size: 0,
            message: message.into(),
            failure: Some(kind),
        }
    }
}

/// Live progress of a build
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProgressEvent {
    /// 0..=100, non-decreasing within one build
    pub percent: u8,
    /// Human-readable status
    pub message: String,
    /// Page index currently being worked on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_index: Option<u32>,
    /// Pages successfully collected so far
    pub collected: u32,
    /// Total pages according to the locator, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_estimate: Option<u32>,
}

/// Named states of the report assembler
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BuildState {
    /// Establishing the upstream session
    Init,
    /// Running the page locator
    Scanning,
    /// Resolving and downloading a page
    Fetching {
        /// Page index
        index: u32,
    },
    /// Waiting before another attempt at a page
    Retrying {
        /// Page index
        index: u32,
        /// Failed attempts so far
        attempt: u32,
    },
    /// A page finished (collected, dropped, or given up on)
    PageDone {
        /// Page index
        index: u32,
    },
    /// Encoding the document
    Finalizing,
    /// Document written
    Succeeded,
    /// Build ended without a document
    Failed,
}

/// Events broadcast by [`ReportDownloader`](crate::ReportDownloader)
///
/// Subscribe with [`ReportDownloader::subscribe`](crate::ReportDownloader::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A report build was accepted and started
    ReportStarted {
        /// Catalog project id
        project_id: String,
    },

    /// Build progress
    ReportProgress {
        /// Catalog project id
        project_id: String,
        /// Progress snapshot
        progress: ProgressEvent,
    },

    /// A report was built and registered
    ReportComplete {
        /// Catalog project id
        project_id: String,
        /// Catalog report id
        report_id: String,
        /// Build result
        result: ReportBuildResult,
    },

    /// A report build ended without a document
    ReportFailed {
        /// Catalog project id
        project_id: String,
        /// Failure message
        message: String,
    },

    /// A project was imported from the portal
    ProjectImported {
        /// Catalog project id
        project_id: String,
        /// Whether an existing record was updated
        updated: bool,
    },

    /// A project and its reports were removed
    ProjectDeleted {
        /// Catalog project id
        project_id: String,
    },
}

/// Messages of the per-build server-sent event stream
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportStreamEvent {
    /// Build accepted
    Start {
        /// Status text
        message: String,
    },
    /// Progress snapshot
    Progress(ProgressEvent),
    /// Document built and registered
    Complete {
        /// Status text
        message: String,
        /// Catalog report id
        report_id: String,
        /// Build result
        result: ReportBuildResult,
    },
    /// Build failed
    Error {
        /// Failure message
        message: String,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_sanitizes_display_name() {
        let req = ProjectReportRequest::new("abc", Some(" 面向*未来: 的/研究? "));
        assert_eq!(req.display_name, "面向未来 的研究");
    }

    #[test]
    fn request_falls_back_to_identifier() {
        assert_eq!(ProjectReportRequest::new("abc", None).display_name, "nsfc_abc");
        assert_eq!(
            ProjectReportRequest::new("abc", Some("?*:")).display_name,
            "nsfc_abc"
        );
    }

    #[test]
    fn stream_event_tags() {
        let start = serde_json::to_value(ReportStreamEvent::Start {
            message: "go".into(),
        })
        .unwrap();
        assert_eq!(start["type"], "start");

        let progress = serde_json::to_value(ReportStreamEvent::Progress(ProgressEvent {
            percent: 42,
            message: "page 3".into(),
            current_index: Some(3),
            collected: 2,
            total_estimate: None,
        }))
        .unwrap();
        assert_eq!(progress["type"], "progress");
        assert_eq!(progress["percent"], 42);
        assert!(progress.get("total_estimate").is_none());

        let error = serde_json::to_value(ReportStreamEvent::Error {
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(error["type"], "error");
    }

    #[test]
    fn failed_result_has_no_artifact() {
        let r = ReportBuildResult::failed(FailureKind::NoValidImages, "no valid images");
        assert!(!r.success);
        assert!(r.file_path.is_none());
        assert_eq!(
            serde_json::to_value(&r).unwrap()["failure"],
            "no_valid_images"
        );
    }
}
