//! Error types for nsfc-report-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Database, Document, Config, etc.)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for nsfc-report-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nsfc-report-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "upload_dir")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream answered with an unexpected HTTP status
    #[error("upstream returned HTTP {status} for {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Upstream answered with a payload we could not interpret
    #[error("unexpected upstream response: {0}")]
    Upstream(String),

    /// Page decoding or document encoding failed
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Request rejected by input validation
    #[error("validation error: {0}")]
    Validation(String),

    /// A report build is already running for this project
    #[error("a report build is already running for project {project_id}")]
    BuildInProgress {
        /// Catalog project id
        project_id: String,
    },

    /// Shutdown in progress - not accepting new builds
    #[error("shutdown in progress: not accepting new report builds")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Page image and output document errors
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Page bytes could not be decoded as an image
    #[error("page {index} is not a decodable image: {reason}")]
    CorruptPage {
        /// 1-based page index
        index: u32,
        /// Decoder message
        reason: String,
    },

    /// Encoding the multi-page document failed
    #[error("failed to encode document: {0}")]
    EncodeFailed(String),

    /// Nothing to encode
    #[error("no pages to encode")]
    Empty,
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "not found: project 3f0c...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,

            Error::NotFound(_) => 404,

            Error::BuildInProgress { .. } => 409,

            Error::Document(DocumentError::CorruptPage { .. }) => 422,
            Error::Document(DocumentError::Empty) => 422,

            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Document(DocumentError::EncodeFailed(_)) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // External service errors
            Error::Network(_) => 502,
            Error::HttpStatus { .. } => 502,
            Error::Upstream(_) => 502,

            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::Network(_) => "network_error",
            Error::HttpStatus { .. } => "upstream_status",
            Error::Upstream(_) => "upstream_error",
            Error::Document(e) => match e {
                DocumentError::CorruptPage { .. } => "corrupt_page",
                DocumentError::EncodeFailed(_) => "encode_failed",
                DocumentError::Empty => "empty_document",
            },
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation_error",
            Error::BuildInProgress { .. } => "build_in_progress",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::BuildInProgress { project_id } => Some(serde_json::json!({
                "project_id": project_id,
            })),
            Error::HttpStatus { status, url } => Some(serde_json::json!({
                "status": status,
                "url": url,
            })),
            Error::Document(DocumentError::CorruptPage { index, .. }) => {
                Some(serde_json::json!({ "page": index }))
            }
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "bad".into(),
                    key: Some("upload_dir".into()),
                },
                400,
                "config_error",
            ),
            (
                Error::Database(DatabaseError::QueryFailed("x".into())),
                500,
                "database_error",
            ),
            (
                Error::HttpStatus {
                    status: 503,
                    url: "https://kd.nsfc.cn/x".into(),
                },
                502,
                "upstream_status",
            ),
            (Error::Upstream("no data".into()), 502, "upstream_error"),
            (
                Error::Document(DocumentError::CorruptPage {
                    index: 2,
                    reason: "bad header".into(),
                }),
                422,
                "corrupt_page",
            ),
            (
                Error::Document(DocumentError::EncodeFailed("disk".into())),
                500,
                "encode_failed",
            ),
            (Error::Document(DocumentError::Empty), 422, "empty_document"),
            (
                Error::Io(std::io::Error::other("boom")),
                500,
                "io_error",
            ),
            (Error::NotFound("project 1".into()), 404, "not_found"),
            (Error::Validation("title".into()), 400, "validation_error"),
            (
                Error::BuildInProgress {
                    project_id: "p1".into(),
                },
                409,
                "build_in_progress",
            ),
            (Error::ShuttingDown, 503, "shutting_down"),
            (Error::ApiServerError("bind".into()), 500, "api_server_error"),
            (Error::Other("???".into()), 500, "internal_error"),
        ]
    }

    #[test]
    fn every_variant_maps_to_expected_status_code() {
        for (error, status, _) in all_error_variants() {
            assert_eq!(error.status_code(), status, "status for {error:?}");
        }
    }

    #[test]
    fn every_variant_maps_to_expected_error_code() {
        for (error, _, code) in all_error_variants() {
            assert_eq!(error.error_code(), code, "code for {error:?}");
        }
    }

    #[test]
    fn api_error_from_build_in_progress_has_project_id() {
        let api: ApiError = Error::BuildInProgress {
            project_id: "abc".into(),
        }
        .into();
        assert_eq!(api.error.code, "build_in_progress");
        assert_eq!(api.error.details.unwrap()["project_id"], "abc");
    }

    #[test]
    fn api_error_from_corrupt_page_has_page_index() {
        let api: ApiError = Error::Document(DocumentError::CorruptPage {
            index: 7,
            reason: "truncated".into(),
        })
        .into();
        assert_eq!(api.error.details.unwrap()["page"], 7);
    }

    #[test]
    fn api_error_from_io_has_no_details() {
        let api: ApiError = Error::Io(std::io::Error::other("x")).into();
        assert!(api.error.details.is_none());
        assert_eq!(api.error.code, "io_error");
    }
}
