//! Application state for the API server

use crate::{Config, ReportDownloader};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The service facade
    pub downloader: Arc<ReportDownloader>,

    /// Configuration the server was started with
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<ReportDownloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}
