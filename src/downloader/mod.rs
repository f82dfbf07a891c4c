//! Service facade split into focused submodules.
//!
//! The `ReportDownloader` struct and its methods are organized by domain:
//! - [`projects`] - Catalog import, CRUD and listing
//! - [`builds`] - Report builds (streaming, synchronous, cancellation)
//! - [`reports`] - Report files: upload, lookup, deletion
//! - [`lifecycle`] - Shutdown coordination

mod builds;
mod lifecycle;
mod projects;
mod reports;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use builds::CompletedBuild;
pub use projects::{FetchedProject, ProjectDetail, ProjectPage};

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::extractor::{ApiMetadataExtractor, MetadataExtractor};
use crate::types::Event;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Event channel capacity; subscribers lagging further behind skip ahead
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Running builds and admission state
#[derive(Clone)]
pub(crate) struct BuildRegistry {
    /// Catalog project id to the cancellation token of its running build
    pub(crate) active: Arc<Mutex<HashMap<String, CancellationToken>>>,
    /// Cleared during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl BuildRegistry {
    fn new() -> Self {
        Self {
            active: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Lock the running-build map; never held across an await
    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Main service instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ReportDownloader {
    /// Catalog database
    /// Public for integration tests to inspect records
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Turns portal URLs into project metadata
    pub(crate) extractor: Arc<dyn MetadataExtractor>,
    /// Running builds
    pub(crate) builds: BuildRegistry,
}

impl ReportDownloader {
    /// Create a new ReportDownloader instance
    ///
    /// Validates the configuration, creates the upload directory and opens
    /// (migrating if needed) the catalog database.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.persistence.upload_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create upload directory '{}': {}",
                        config.persistence.upload_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.persistence.database_path).await?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let extractor = Arc::new(ApiMetadataExtractor::new(config.transport.clone()));

        tracing::info!(
            database = %config.persistence.database_path.display(),
            upload_dir = %config.persistence.upload_dir.display(),
            origin = %config.transport.origin,
            "report downloader initialized"
        );

        Ok(Self {
            db: Arc::new(db),
            event_tx,
            config: Arc::new(config),
            extractor,
            builds: BuildRegistry::new(),
        })
    }

    /// Replace the metadata extractor used by [`fetch_project`](Self::fetch_project)
    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Subscribe to report events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls more than 1000 events behind gets `RecvError::Lagged` and resumes
    /// with the oldest retained event.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use nsfc_report_dl::{Config, ReportDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = ReportDownloader::new(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "report event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers; dropped when nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
