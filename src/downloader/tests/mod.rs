use super::test_helpers::*;
use super::*;
use crate::db::{ProjectFilter, ProjectUpdate};
use crate::types::{FailureKind, ReportStreamEvent};
use std::time::Duration;
use wiremock::MockServer;

mod reports;

/// Drain a build stream until it closes
async fn collect_stream(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<ReportStreamEvent>,
) -> Vec<ReportStreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("build stream stalled")
    {
        events.push(event);
    }
    events
}

/// Drain already-broadcast events without waiting
fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
