//! Report builds: streaming, synchronous and cancellation.

use crate::db::{NewReport, Project, Report};
use crate::error::{Error, Result};
use crate::extractor::fetch_project_name;
use crate::report::{
    BroadcastProgress, ChannelProgress, FanOut, HttpPageSource, LogProgress, ReportAssembler,
};
use crate::transport::TransportClient;
use crate::types::{
    Event, FailureKind, ProjectReportRequest, ReportBuildResult, ReportStreamEvent,
};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use super::{BuildRegistry, ReportDownloader};
use super::projects::remove_report_file;

/// A finished build and, on success, the registered report
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct CompletedBuild {
    /// What the assembler produced
    pub result: ReportBuildResult,
    /// Catalog record of the written document
    pub report: Option<Report>,
}

/// A build admitted into the registry, not yet started
struct AdmittedBuild {
    project: Project,
    nsfc_id: String,
    token: CancellationToken,
    _slot: BuildSlot,
}

/// Releases a project's registry entry on every exit path, including a
/// dropped caller future or a panicking build task.
struct BuildSlot {
    registry: BuildRegistry,
    project_id: String,
}

impl Drop for BuildSlot {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.project_id);
    }
}

impl ReportDownloader {
    /// Build the closing report of a catalog project and wait for the result
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the project does not exist
    /// - [`Error::Validation`] if the project has no portal id
    /// - [`Error::BuildInProgress`] if a build for the project is already running
    /// - [`Error::ShuttingDown`] during shutdown
    ///
    /// A build that runs but produces no document is not an error: see
    /// [`CompletedBuild::result`].
    pub async fn build_report(&self, project_id: &str) -> Result<CompletedBuild> {
        let admitted = self.admit_build(project_id).await?;
        Ok(self.run_build(admitted, None).await)
    }

    /// Start a build on its own task and stream its progress
    ///
    /// The stream opens with [`ReportStreamEvent::Start`], carries every
    /// progress snapshot, and ends with exactly one `Complete` or `Error`
    /// message. Dropping the receiver does not stop the build; use
    /// [`cancel_build`](Self::cancel_build) for that.
    pub async fn spawn_report_build(
        &self,
        project_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<ReportStreamEvent>> {
        let admitted = self.admit_build(project_id).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ReportStreamEvent::Start {
            message: "Starting closing report download".to_string(),
        })
        .ok();

        let downloader = self.clone();
        tokio::spawn(async move {
            downloader.run_build(admitted, Some(tx)).await;
        });

        Ok(rx)
    }

    /// Ask the running build of a project to stop at the next page boundary
    pub async fn cancel_build(&self, project_id: &str) -> Result<()> {
        let active = self.builds.lock();
        let token = active
            .get(project_id)
            .ok_or_else(|| Error::NotFound(format!("running build for project {}", project_id)))?;
        token.cancel();
        tracing::info!(project_id, "report build cancellation requested");
        Ok(())
    }

    /// Catalog ids of projects with a running build
    pub async fn active_builds(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.builds.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn admit_build(&self, project_id: &str) -> Result<AdmittedBuild> {
        if !self.builds.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let project = self.require_project(project_id).await?;
        let nsfc_id = project.upstream_id().ok_or_else(|| {
            Error::Validation(format!(
                "project {} has no portal id and its URL carries none",
                project_id
            ))
        })?;

        let token = CancellationToken::new();
        let mut active = self.builds.lock();
        if active.contains_key(project_id) {
            return Err(Error::BuildInProgress {
                project_id: project_id.to_string(),
            });
        }
        active.insert(project_id.to_string(), token.clone());
        drop(active);

        Ok(AdmittedBuild {
            project,
            nsfc_id,
            token,
            _slot: BuildSlot {
                registry: self.builds.clone(),
                project_id: project_id.to_string(),
            },
        })
    }

    async fn run_build(
        &self,
        admitted: AdmittedBuild,
        stream: Option<mpsc::UnboundedSender<ReportStreamEvent>>,
    ) -> CompletedBuild {
        let project_id = admitted.project.id.clone();
        tracing::info!(
            project_id = %project_id,
            nsfc_id = %admitted.nsfc_id,
            title = %admitted.project.title,
            "report build started"
        );
        self.emit_event(Event::ReportStarted {
            project_id: project_id.clone(),
        });

        let result = self.assemble(&admitted, stream.clone()).await;
        let completed = self.register(&project_id, result).await;

        match &completed.report {
            Some(report) => {
                self.emit_event(Event::ReportComplete {
                    project_id: project_id.clone(),
                    report_id: report.id.clone(),
                    result: completed.result.clone(),
                });
                if let Some(tx) = &stream {
                    tx.send(ReportStreamEvent::Complete {
                        message: completed.result.message.clone(),
                        report_id: report.id.clone(),
                        result: completed.result.clone(),
                    })
                    .ok();
                }
            }
            None => {
                self.emit_event(Event::ReportFailed {
                    project_id: project_id.clone(),
                    message: completed.result.message.clone(),
                });
                if let Some(tx) = &stream {
                    tx.send(ReportStreamEvent::Error {
                        message: completed.result.message.clone(),
                    })
                    .ok();
                }
            }
        }

        drop(admitted);
        completed
    }

    async fn assemble(
        &self,
        admitted: &AdmittedBuild,
        stream: Option<mpsc::UnboundedSender<ReportStreamEvent>>,
    ) -> ReportBuildResult {
        let transport = match TransportClient::new(&self.config.transport) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(project_id = %admitted.project.id, error = %e, "transport setup failed");
                return ReportBuildResult::failed(FailureKind::Internal, e.to_string());
            }
        };

        let display_name = self.display_name(&transport, admitted).await;
        let request = ProjectReportRequest::new(admitted.nsfc_id.clone(), display_name.as_deref());

        let mut sinks = FanOut::new()
            .with(Arc::new(LogProgress::new(admitted.project.id.clone())))
            .with(Arc::new(BroadcastProgress::new(
                admitted.project.id.clone(),
                self.event_tx.clone(),
            )));
        if let Some(tx) = stream {
            // A closed stream only means the client went away; the build carries on
            sinks = sinks.with(Arc::new(ChannelProgress::wrapping(
                tx,
                ReportStreamEvent::Progress,
            )));
        }

        ReportAssembler::new(
            Arc::new(HttpPageSource::new(transport)),
            self.config.locator.clone(),
            self.config.fetch.clone(),
            self.config.persistence.upload_dir.clone(),
        )
        .with_progress(Arc::new(sinks))
        .with_cancellation(admitted.token.clone())
        .build(&request)
        .await
    }

    /// Catalog title, or the portal's project name when the catalog only has a placeholder
    async fn display_name(
        &self,
        transport: &TransportClient,
        admitted: &AdmittedBuild,
    ) -> Option<String> {
        let title = admitted.project.title.trim();
        let placeholder = format!("nsfc_{}", admitted.nsfc_id);
        if !title.is_empty() && title != placeholder {
            return Some(title.to_string());
        }
        transport.init_session().await;
        fetch_project_name(transport, &admitted.nsfc_id).await
    }

    /// Attach a successful build to its project
    async fn register(&self, project_id: &str, result: ReportBuildResult) -> CompletedBuild {
        let (Some(path), Some(filename), true) =
            (result.file_path.clone(), result.filename.clone(), result.success)
        else {
            return CompletedBuild {
                result,
                report: None,
            };
        };

        let record = NewReport {
            project_id: project_id.to_string(),
            filename,
            file_path: path.to_string_lossy().into_owned(),
            file_size: i64::try_from(result.file_size).unwrap_or(i64::MAX),
            page_count: Some(i64::from(result.page_count)),
        };

        match self.db.create_report_record(&record).await {
            Ok(report) => {
                tracing::info!(
                    project_id,
                    report_id = %report.id,
                    filename = %report.filename,
                    pages = result.page_count,
                    "report registered"
                );
                CompletedBuild {
                    result,
                    report: Some(report),
                }
            }
            Err(e) => {
                tracing::error!(project_id, error = %e, "failed to register built report");
                remove_report_file(&record.file_path).await;
                CompletedBuild {
                    result: ReportBuildResult::failed(
                        FailureKind::Internal,
                        format!("report was built but could not be registered: {}", e),
                    ),
                    report: None,
                }
            }
        }
    }
}
