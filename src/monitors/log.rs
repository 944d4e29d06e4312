//! # LogWriter: event renderer backed by `tracing`
//!
//! A built-in monitor that turns runtime [`Event`]s into structured `tracing` records.
//! Failures, lag, and monitor trouble log at `warn`; everything else at `info`/`debug`.

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::monitors::Monitor;

/// Event writer monitor.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Monitor for LogWriter {
    async fn on_event(&self, e: &Event) {
        let source = e.source.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::OperationStarted => {
                tracing::info!(op = source, invocation = ?e.invocation, "operation started");
            }
            EventKind::OperationFinished => {
                tracing::info!(op = source, invocation = ?e.invocation, snapshots = ?e.snapshots, "operation finished");
            }
            EventKind::OperationFailed => {
                tracing::warn!(op = source, invocation = ?e.invocation, snapshots = ?e.snapshots, err = reason, "operation failed");
            }
            EventKind::OperationCancelled => {
                tracing::info!(op = source, invocation = ?e.invocation, snapshots = ?e.snapshots, "operation cancelled");
            }
            EventKind::TimeoutHit => {
                tracing::warn!(op = source, invocation = ?e.invocation, timeout_ms = ?e.timeout_ms, "operation timed out");
            }
            EventKind::SubscriptionOpened => {
                tracing::debug!(store = source, subscription = ?e.subscription, "subscription opened");
            }
            EventKind::SubscriptionClosed => {
                tracing::debug!(store = source, subscription = ?e.subscription, reason, "subscription closed");
            }
            EventKind::SubscriptionLagged => {
                tracing::warn!(store = source, subscription = ?e.subscription, skipped = reason, "subscriber lagging");
            }
            EventKind::StoreClosed => {
                tracing::debug!(store = source, "store closed");
            }
            EventKind::MonitorOverflow => {
                tracing::warn!(monitor = source, invocation = ?e.invocation, reason, "monitor overflow");
            }
            EventKind::MonitorPanicked => {
                tracing::warn!(monitor = source, info = reason, "monitor panicked");
            }
            EventKind::ShutdownRequested => {
                tracing::info!("shutdown requested");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
