//! Report assembler -- the page-by-page retrieval state machine.
//!
//! `Init → Scanning → Fetching(i) ⇄ Retrying(i, n) → PageDone(i) → … → Finalizing → Succeeded | Failed`
//!
//! Pages are fetched strictly in order, one request at a time. The build
//! never returns an error: every outcome, including unexpected faults, is a
//! [`ReportBuildResult`].

use super::document::{decode_page, write_report};
use super::locator::PageLocator;
use super::progress::{NullProgress, ProgressSink};
use super::source::{PageSource, ProbeMode};
use crate::config::{FetchConfig, LocatorConfig};
use crate::error::{Error, Result};
use crate::types::{
    BuildState, FailureKind, FetchOutcome, PageImage, PageResolution, ProgressEvent,
    ProjectReportRequest, ReportBuildResult,
};
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Highest percentage reported before a terminal state
const MAX_RUNNING_PERCENT: u8 = 98;

/// Drives one report build from session setup to the written document
pub struct ReportAssembler {
    source: Arc<dyn PageSource>,
    locator: LocatorConfig,
    fetch: FetchConfig,
    output_dir: PathBuf,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

enum ResolveStep {
    Found(String),
    /// NotFound, or Transient through every attempt
    End,
}

enum DownloadStep {
    Bytes(Vec<u8>),
    End,
    Exhausted,
}

enum Interrupt {
    Cancelled,
}

impl ReportAssembler {
    /// New assembler writing into `output_dir`
    pub fn new(
        source: Arc<dyn PageSource>,
        locator: LocatorConfig,
        fetch: FetchConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            locator,
            fetch,
            output_dir: output_dir.into(),
            progress: Arc::new(NullProgress),
            cancel: CancellationToken::new(),
        }
    }

    /// Report progress to `sink`
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// Stop at the next page boundary once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the build to completion
    pub async fn build(&self, request: &ProjectReportRequest) -> ReportBuildResult {
        let mut run = BuildRun::new(self.progress.as_ref(), &request.project_identifier);

        let result = match self.run(request, &mut run).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    project_id = %request.project_identifier,
                    error = %e,
                    "report build failed unexpectedly"
                );
                ReportBuildResult::failed(FailureKind::Internal, e.to_string())
            }
        };

        if result.success {
            run.enter(BuildState::Succeeded);
            tracing::info!(
                project_id = %request.project_identifier,
                pages = result.page_count,
                file = ?result.file_path,
                "report build succeeded"
            );
        } else {
            run.enter(BuildState::Failed);
            tracing::warn!(
                project_id = %request.project_identifier,
                reason = ?result.failure,
                message = %result.message,
                "report build failed"
            );
        }
        run.finish(&result.message);
        result
    }

    async fn run(
        &self,
        request: &ProjectReportRequest,
        run: &mut BuildRun<'_>,
    ) -> Result<ReportBuildResult> {
        let project_id = request.project_identifier.as_str();

        run.enter(BuildState::Init);
        self.source.init_session().await;
        run.emit(5, None, "Session initialized");

        run.enter(BuildState::Scanning);
        run.emit(5, None, "Locating report pages");
        if self.locator.enabled {
            run.total = PageLocator::new(self.source.as_ref(), &self.locator)
                .locate(project_id)
                .await;
        }
        match run.total {
            Some(total) => run.emit(10, None, format!("Found about {} pages", total)),
            None => run.emit(10, None, "Page count unknown, fetching until the end"),
        }

        let ceiling = self.locator.ceiling;
        for index in 1..=ceiling {
            if index > 1 && self.pause(self.courtesy_delay()).await.is_err() {
                return Ok(cancelled());
            }
            if self.cancel.is_cancelled() {
                return Ok(cancelled());
            }

            run.enter(BuildState::Fetching { index });
            run.emit_fetching(index, format!("Fetching page {}", index));

            let url = match self.resolve_page(project_id, index, run).await {
                Ok(ResolveStep::Found(url)) => url,
                Ok(ResolveStep::End) => break,
                Err(Interrupt::Cancelled) => return Ok(cancelled()),
            };

            match self.download_page(index, &url, run).await {
                Ok(DownloadStep::Bytes(bytes)) => {
                    run.consecutive_failures = 0;
                    match decode_off_runtime(index, bytes).await? {
                        Some(page) => {
                            run.images.push(page);
                            run.collected += 1;
                        }
                        None => {
                            run.enter(BuildState::PageDone { index });
                            run.emit_fetching(index, format!("Page {} is corrupt, skipped", index));
                            continue;
                        }
                    }
                }
                Ok(DownloadStep::End) => break,
                Ok(DownloadStep::Exhausted) => {
                    run.consecutive_failures += 1;
                    tracing::warn!(
                        project_id,
                        index,
                        consecutive = run.consecutive_failures,
                        "page download failed after all retries"
                    );
                    if run.consecutive_failures >= self.fetch.max_consecutive_failures {
                        return Ok(ReportBuildResult::failed(
                            FailureKind::ConnectivityDegraded,
                            format!(
                                "connectivity degraded: {} consecutive pages failed",
                                run.consecutive_failures
                            ),
                        ));
                    }
                    run.enter(BuildState::PageDone { index });
                    run.emit_fetching(index, format!("Page {} failed, continuing", index));
                    continue;
                }
                Err(Interrupt::Cancelled) => return Ok(cancelled()),
            }

            run.enter(BuildState::PageDone { index });
            run.emit_fetching(index, format!("Page {} collected", index));
        }

        if run.images.is_empty() {
            return Ok(ReportBuildResult::failed(
                FailureKind::NoValidImages,
                "no valid images were retrieved",
            ));
        }

        run.enter(BuildState::Finalizing);
        run.emit(
            MAX_RUNNING_PERCENT,
            None,
            format!("Composing document from {} pages", run.images.len()),
        );

        let pages = std::mem::take(&mut run.images);
        let written = write_report(
            &self.output_dir,
            &request.display_name,
            pages,
            self.fetch.resolution_dpi,
            self.fetch.jpeg_quality,
        )
        .await?;

        Ok(ReportBuildResult::succeeded(
            written.path,
            written.filename,
            written.page_count,
            written.size,
        ))
    }

    async fn resolve_page(
        &self,
        project_id: &str,
        index: u32,
        run: &mut BuildRun<'_>,
    ) -> std::result::Result<ResolveStep, Interrupt> {
        let attempts = self.fetch.resolve_attempts;
        for attempt in 1..=attempts {
            match self.source.resolve(project_id, index, ProbeMode::Fetch).await {
                PageResolution::Found(url) => return Ok(ResolveStep::Found(url)),
                PageResolution::NotFound => {
                    tracing::info!(project_id, index, "no more pages");
                    return Ok(ResolveStep::End);
                }
                PageResolution::Transient if attempt < attempts => {
                    run.enter(BuildState::Retrying { index, attempt });
                    run.emit_fetching(
                        index,
                        format!("Page {} lookup failed, retry {}/{}", index, attempt, attempts - 1),
                    );
                    self.pause(self.fetch.resolve_backoff.delay_for(attempt)).await?;
                }
                PageResolution::Transient => {}
            }
        }
        tracing::warn!(project_id, index, attempts, "page lookup kept failing, treating as end");
        Ok(ResolveStep::End)
    }

    async fn download_page(
        &self,
        index: u32,
        url: &str,
        run: &mut BuildRun<'_>,
    ) -> std::result::Result<DownloadStep, Interrupt> {
        let attempts = self.fetch.download_attempts;
        for attempt in 1..=attempts {
            match self.source.download(url).await {
                FetchOutcome::Bytes(bytes) => return Ok(DownloadStep::Bytes(bytes)),
                FetchOutcome::NotFound => {
                    tracing::info!(index, url, "page image gone, ending report");
                    return Ok(DownloadStep::End);
                }
                FetchOutcome::Transient if attempt < attempts => {
                    run.enter(BuildState::Retrying { index, attempt });
                    run.emit_fetching(
                        index,
                        format!("Page {} download failed, retry {}/{}", index, attempt, attempts - 1),
                    );
                    self.pause(self.fetch.download_backoff.delay_for(attempt)).await?;
                }
                FetchOutcome::Transient => {}
            }
        }
        Ok(DownloadStep::Exhausted)
    }

    fn courtesy_delay(&self) -> Duration {
        let (min, max) = (self.fetch.page_delay_min, self.fetch.page_delay_max);
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    /// Sleep unless cancelled first
    async fn pause(&self, duration: Duration) -> std::result::Result<(), Interrupt> {
        if duration.is_zero() {
            return if self.cancel.is_cancelled() {
                Err(Interrupt::Cancelled)
            } else {
                Ok(())
            };
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

fn cancelled() -> ReportBuildResult {
    ReportBuildResult::failed(FailureKind::Cancelled, "report build cancelled")
}

/// `Ok(None)` for undecodable bytes
async fn decode_off_runtime(index: u32, bytes: Vec<u8>) -> Result<Option<PageImage>> {
    let decoded = tokio::task::spawn_blocking(move || decode_page(index, &bytes))
        .await
        .map_err(|e| Error::Other(format!("decoder task failed: {}", e)))?;
    match decoded {
        Ok(page) => Ok(Some(page)),
        Err(e) => {
            tracing::warn!(index, error = %e, "dropping corrupt page");
            Ok(None)
        }
    }
}

/// Mutable state of one build
struct BuildRun<'a> {
    project_id: &'a str,
    sink: &'a dyn ProgressSink,
    state: BuildState,
    last_percent: u8,
    total: Option<u32>,
    collected: u32,
    consecutive_failures: u32,
    images: Vec<PageImage>,
}

impl<'a> BuildRun<'a> {
    fn new(sink: &'a dyn ProgressSink, project_id: &'a str) -> Self {
        Self {
            project_id,
            sink,
            state: BuildState::Init,
            last_percent: 0,
            total: None,
            collected: 0,
            consecutive_failures: 0,
            images: Vec::new(),
        }
    }

    fn enter(&mut self, next: BuildState) {
        tracing::debug!(project_id = self.project_id, from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    /// Percentage while fetching: share of the located total, or a capped curve over the index
    fn fetch_percent(&self, index: u32) -> u8 {
        let span = match self.total {
            Some(total) if total > 0 => u64::from(self.collected) * 85 / u64::from(total),
            _ => u64::from(index) * 80 / 100,
        };
        10 + span.min(85) as u8
    }

    fn emit_fetching(&mut self, index: u32, message: String) {
        let percent = self.fetch_percent(index);
        self.emit(percent, Some(index), message);
    }

    fn emit(&mut self, percent: u8, current_index: Option<u32>, message: impl Into<String>) {
        let percent = percent.clamp(self.last_percent, MAX_RUNNING_PERCENT);
        self.last_percent = percent;
        self.sink.emit(ProgressEvent {
            percent,
            message: message.into(),
            current_index,
            collected: self.collected,
            total_estimate: self.total,
        });
    }

    fn finish(&mut self, message: &str) {
        self.last_percent = 100;
        self.sink.emit(ProgressEvent {
            percent: 100,
            message: message.to_string(),
            current_index: None,
            collected: self.collected,
            total_estimate: self.total,
        });
    }
}
