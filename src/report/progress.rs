//! Progress sinks -- where the assembler's [`ProgressEvent`]s go.
//!
//! Emitting never blocks and never fails from the assembler's point of view:
//! channel sinks are unbounded or drop-oldest, and closed receivers are ignored.

use crate::types::{Event, ProgressEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Receiver of build progress, called in emission order
pub trait ProgressSink: Send + Sync {
    /// Deliver one progress snapshot
    fn emit(&self, event: ProgressEvent);
}

/// Discards everything (synchronous builds)
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Writes every snapshot to the log
#[derive(Clone, Debug)]
pub struct LogProgress {
    project_id: String,
}

impl LogProgress {
    /// Log progress for `project_id`
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }
}

impl ProgressSink for LogProgress {
    fn emit(&self, event: ProgressEvent) {
        tracing::info!(
            project_id = %self.project_id,
            percent = event.percent,
            index = ?event.current_index,
            collected = event.collected,
            total = ?event.total_estimate,
            "{}",
            event.message
        );
    }
}

/// Forwards snapshots into an unbounded channel drained by the request layer
///
/// `T` is the channel's message type; each snapshot passes through `wrap`
/// first, so one channel can also carry start and completion messages.
#[derive(Clone, Debug)]
pub struct ChannelProgress<T = ProgressEvent> {
    tx: mpsc::UnboundedSender<T>,
    wrap: fn(ProgressEvent) -> T,
}

impl ChannelProgress<ProgressEvent> {
    /// A sink plus the receiving end
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::wrapping(tx, std::convert::identity), rx)
    }
}

impl<T> ChannelProgress<T> {
    /// Send every snapshot into `tx` as `wrap(snapshot)`
    pub fn wrapping(tx: mpsc::UnboundedSender<T>, wrap: fn(ProgressEvent) -> T) -> Self {
        Self { tx, wrap }
    }
}

impl<T: Send> ProgressSink for ChannelProgress<T> {
    fn emit(&self, event: ProgressEvent) {
        self.tx.send((self.wrap)(event)).ok();
    }
}

/// Publishes snapshots as [`Event::ReportProgress`] on the global event channel
#[derive(Clone, Debug)]
pub struct BroadcastProgress {
    project_id: String,
    tx: broadcast::Sender<Event>,
}

impl BroadcastProgress {
    /// Publish progress for catalog project `project_id`
    pub fn new(project_id: impl Into<String>, tx: broadcast::Sender<Event>) -> Self {
        Self {
            project_id: project_id.into(),
            tx,
        }
    }
}

impl ProgressSink for BroadcastProgress {
    fn emit(&self, event: ProgressEvent) {
        // Err only means nobody is subscribed
        self.tx
            .send(Event::ReportProgress {
                project_id: self.project_id.clone(),
                progress: event,
            })
            .ok();
    }
}

/// Delivers to several sinks in order
#[derive(Clone, Default)]
pub struct FanOut(Vec<Arc<dyn ProgressSink>>);

impl FanOut {
    /// Empty fan-out
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.0.push(sink);
        self
    }
}

impl ProgressSink for FanOut {
    fn emit(&self, event: ProgressEvent) {
        for sink in &self.0 {
            sink.emit(event.clone());
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReportStreamEvent;

    fn snapshot(percent: u8) -> ProgressEvent {
        ProgressEvent {
            percent,
            message: format!("{percent}%"),
            current_index: None,
            collected: 0,
            total_estimate: None,
        }
    }

    #[test]
    fn channel_preserves_order_and_ignores_closed_receiver() {
        let (sink, mut rx) = ChannelProgress::new();
        sink.emit(snapshot(5));
        sink.emit(snapshot(10));
        assert_eq!(rx.try_recv().unwrap().percent, 5);
        assert_eq!(rx.try_recv().unwrap().percent, 10);

        drop(rx);
        sink.emit(snapshot(20));
    }

    #[test]
    fn wrapping_channel_maps_each_snapshot() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelProgress::wrapping(tx, ReportStreamEvent::Progress);
        sink.emit(snapshot(40));
        match rx.try_recv().unwrap() {
            ReportStreamEvent::Progress(progress) => assert_eq!(progress.percent, 40),
            other => panic!("unexpected stream event {other:?}"),
        }
    }

    #[test]
    fn broadcast_wraps_in_event() {
        let (tx, mut rx) = broadcast::channel(4);
        BroadcastProgress::new("p1", tx).emit(snapshot(50));
        match rx.try_recv().unwrap() {
            Event::ReportProgress { project_id, progress } => {
                assert_eq!(project_id, "p1");
                assert_eq!(progress.percent, 50);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn broadcast_without_subscribers_is_silent() {
        let (tx, rx) = broadcast::channel::<Event>(4);
        drop(rx);
        BroadcastProgress::new("p1", tx).emit(snapshot(1));
    }

    #[test]
    fn fan_out_reaches_every_sink() {
        let (a, mut rx_a) = ChannelProgress::new();
        let (b, mut rx_b) = ChannelProgress::new();
        let fan = FanOut::new().with(Arc::new(a)).with(Arc::new(b));
        fan.emit(snapshot(30));
        assert_eq!(rx_a.try_recv().unwrap().percent, 30);
        assert_eq!(rx_b.try_recv().unwrap().percent, 30);
    }
}
