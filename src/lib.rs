//! # nsfc-report-dl
//!
//! Catalog and closing-report assembler for projects funded by the National
//! Natural Science Foundation of China.
//!
//! The public knowledge-discovery portal shows a finished project's closing
//! report as a sequence of page images. This crate locates those pages,
//! downloads them with retry and pacing, and assembles them into a single PDF
//! stored next to a small SQLite catalog of projects, reports and searches.
//!
//! ## Quick Start
//!
//! ```no_run
//! use nsfc_report_dl::{Config, ReportDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = ReportDownloader::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let fetched = downloader
//!         .fetch_project("https://kd.nsfc.cn/finalDetails?id=0123456789abcdef0123456789abcdef")
//!         .await?;
//!     let completed = downloader.build_report(&fetched.project.id).await?;
//!     println!("{}", completed.result.message);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Catalog persistence layer
pub mod db;
/// Service facade (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Project metadata extraction
pub mod extractor;
/// Report page location, download and assembly
pub mod report;
/// Retry logic with exponential backoff
pub mod retry;
/// Portal HTTP session
pub mod transport;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use db::{Database, NewProject, Project, ProjectFilter, ProjectUpdate, Report, SearchEntry};
pub use downloader::{CompletedBuild, FetchedProject, ProjectDetail, ProjectPage, ReportDownloader};
pub use error::{
    ApiError, DatabaseError, DocumentError, Error, ErrorDetail, Result, ToHttpStatus,
};
pub use extractor::{ApiMetadataExtractor, MetadataExtractor, ProjectMetadata};
pub use report::{ProgressSink, ReportAssembler};
pub use types::{
    Event, FailureKind, ProgressEvent, ProjectReportRequest, ReportBuildResult, ReportStreamEvent,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use nsfc_report_dl::{ReportDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let downloader = ReportDownloader::new(config).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: ReportDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

/// Resolve once SIGTERM or SIGINT (Ctrl+C elsewhere) arrives
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

/// Resolve once Ctrl+C arrives
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
