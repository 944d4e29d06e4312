//! # Runtime events emitted by invocations, stores, and monitors.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Invocation events**: one operation call from start to its terminal outcome
//! - **Subscription events**: broadcast subscriptions opening, closing, lagging
//! - **Runtime events**: monitor health and shutdown
//!
//! The [`Event`] struct carries additional metadata such as timestamps, source name,
//! invocation id, and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use uniflow::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::OperationFailed)
//!     .with_source("import")
//!     .with_invocation(7)
//!     .with_reason("step `fetch` failed");
//!
//! assert_eq!(ev.kind, EventKind::OperationFailed);
//! assert_eq!(ev.source.as_deref(), Some("import"));
//! assert_eq!(ev.invocation, Some(7));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Global invocation counter.
static INVOCATION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Allocates a fresh, process-unique invocation id.
pub(crate) fn next_invocation_id() -> u64 {
    INVOCATION_SEQ.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Invocation events ===
    /// An invocation passed validation and started its work.
    ///
    /// Sets:
    /// - `source`: operation name
    /// - `invocation`: invocation id
    OperationStarted,

    /// An invocation finished successfully.
    ///
    /// Sets:
    /// - `source`: operation name
    /// - `invocation`: invocation id
    /// - `snapshots`: number of snapshots delivered
    OperationFinished,

    /// An invocation terminated with an error (including rejected options).
    ///
    /// Sets:
    /// - `source`: operation name
    /// - `invocation`: invocation id
    /// - `snapshots`: number of snapshots delivered before the failure
    /// - `reason`: error message
    OperationFailed,

    /// The consumer cancelled the invocation (or the runtime shut down).
    ///
    /// Sets:
    /// - `source`: operation name
    /// - `invocation`: invocation id
    /// - `snapshots`: number of snapshots delivered before cancellation
    OperationCancelled,

    /// An invocation exceeded its timeout (always followed by `OperationFailed`).
    ///
    /// Sets:
    /// - `source`: operation name
    /// - `invocation`: invocation id
    /// - `timeout_ms`: configured timeout (ms)
    TimeoutHit,

    // === Subscription events ===
    /// A store registered a new subscription.
    ///
    /// Sets:
    /// - `source`: store name
    /// - `subscription`: subscription id
    SubscriptionOpened,

    /// A store deregistered a subscription.
    ///
    /// Sets:
    /// - `source`: store name
    /// - `subscription`: subscription id
    /// - `reason`: "cancelled" or "receiver_gone"
    SubscriptionClosed,

    /// A subscriber fell behind and skipped values.
    ///
    /// Sets:
    /// - `source`: store name
    /// - `subscription`: subscription id
    /// - `reason`: number of skipped values
    SubscriptionLagged,

    /// A store's writer stopped (all handles dropped).
    ///
    /// Sets:
    /// - `source`: store name
    StoreClosed,

    // === Runtime events ===
    /// Monitor dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `source`: monitor name
    /// - `reason`: reason string (e.g., "full", "closed")
    MonitorOverflow,

    /// Monitor panicked during event processing.
    ///
    /// Sets:
    /// - `source`: monitor name
    /// - `reason`: panic info/message
    MonitorPanicked,

    /// Runtime shutdown was requested; in-flight invocations are being cancelled.
    ShutdownRequested,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Operation, store, or monitor name.
    pub source: Option<Arc<str>>,
    /// Invocation id (one per operation call).
    pub invocation: Option<u64>,
    /// Snapshots delivered so far in the invocation.
    pub snapshots: Option<u64>,
    /// Subscription id within a store.
    pub subscription: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Invocation timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            source: None,
            invocation: None,
            snapshots: None,
            subscription: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches a source name.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches an invocation id.
    #[inline]
    pub fn with_invocation(mut self, id: u64) -> Self {
        self.invocation = Some(id);
        self
    }

    /// Attaches the number of delivered snapshots.
    #[inline]
    pub fn with_snapshots(mut self, n: u64) -> Self {
        self.snapshots = Some(n);
        self
    }

    /// Attaches a subscription id.
    #[inline]
    pub fn with_subscription(mut self, id: u64) -> Self {
        self.subscription = Some(id);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a monitor overflow event describing the event `monitor` did not receive.
    ///
    /// The dropped event's invocation and subscription ids are carried over, so the gap
    /// can be traced back to the operation or store that produced it.
    pub fn monitor_overflow(monitor: &'static str, dropped: &Event, cause: &'static str) -> Self {
        let mut ev = Event::new(EventKind::MonitorOverflow)
            .with_source(monitor)
            .with_reason(format!("{cause}: dropped {:?} #{}", dropped.kind, dropped.seq));
        ev.invocation = dropped.invocation;
        ev.subscription = dropped.subscription;
        ev
    }

    /// Creates a monitor panic event.
    #[inline]
    pub fn monitor_panicked(monitor: &'static str, info: String) -> Self {
        Event::new(EventKind::MonitorPanicked)
            .with_source(monitor)
            .with_reason(info)
    }

    /// True for overflow reports, which are never re-reported when they overflow themselves.
    #[inline]
    pub fn is_monitor_overflow(&self) -> bool {
        matches!(self.kind, EventKind::MonitorOverflow)
    }

    /// True for events that close an invocation.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::OperationFinished
                | EventKind::OperationFailed
                | EventKind::OperationCancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::OperationStarted);
        let b = Event::new(EventKind::OperationFinished);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_timeout_saturates() {
        let ev = Event::new(EventKind::TimeoutHit).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(Event::new(EventKind::OperationCancelled).is_terminal());
        assert!(!Event::new(EventKind::TimeoutHit).is_terminal());
    }
}
