//! Shutdown coordination.

use crate::error::Result;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::ReportDownloader;

/// How long shutdown waits for cancelled builds to wind down
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl ReportDownloader {
    /// Gracefully shut down the downloader
    ///
    /// 1. Stops accepting new builds
    /// 2. Cancels all running builds (each stops at its next page boundary)
    /// 3. Waits up to 30 seconds for them to finish
    ///
    /// The database pool closes when the last clone of the downloader is dropped.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.builds.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new report builds");

        self.cancel_all_builds().await;

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_builds()).await {
            Ok(()) => tracing::info!("All report builds finished"),
            Err(_) => {
                tracing::warn!("Timeout waiting for report builds to finish, proceeding with shutdown")
            }
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    pub(crate) async fn cancel_all_builds(&self) {
        let active = self.builds.lock();
        tracing::debug!(active_count = active.len(), "Cancelling all report builds");

        for (project_id, token) in active.iter() {
            tracing::debug!(project_id = %project_id, "Signaling cancellation");
            token.cancel();
        }
    }

    async fn wait_for_active_builds(&self) {
        loop {
            let active_count = self.builds.lock().len();
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for report builds to finish");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
