//! # Non-blocking event fan-out to multiple monitors.
//!
//! Provides [`MonitorSet`]: distributes events to multiple monitors
//! concurrently without blocking the publisher.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► monitor1.on_event()
//!     │    (bounded)         └──────► panic → MonitorPanicked
//!     ├──► [queue 2] ──► worker 2 ──► monitor2.on_event()
//!     └──► [queue N] ──► worker N ──► monitorN.on_event()
//! ```
//!
//! ## Rules
//! - **No cross-monitor ordering**: monitor A may process event N while B processes N+5
//! - **Overflow**: event dropped for that monitor only, `MonitorOverflow` published
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Per-monitor FIFO**: each monitor sees events in order
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a monitor uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::events::{Bus, Event};
use crate::monitors::Monitor;

/// Queue feeding one monitor's worker.
struct Lane {
    monitor: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for runtime event monitors.
pub struct MonitorSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl MonitorSet {
    /// Creates a new set and spawns one worker task per monitor on `handle`.
    #[must_use]
    pub(crate) fn new(monitors: Vec<Arc<dyn Monitor>>, bus: Bus, handle: &Handle) -> Self {
        let (lanes, workers): (Vec<Lane>, Vec<JoinHandle<()>>) = monitors
            .into_iter()
            .map(|monitor| {
                let (tx, rx) = mpsc::channel(monitor.queue_capacity().max(1));
                let lane = Lane {
                    monitor: monitor.name(),
                    tx,
                };
                (lane, handle.spawn(observe(monitor, rx, bus.clone())))
            })
            .unzip();
        Self {
            lanes,
            workers,
            bus,
        }
    }

    /// Hands `event` to every monitor without waiting.
    ///
    /// A monitor whose queue is full (or whose worker is gone) misses the event and a
    /// `MonitorOverflow` naming the dropped event is published instead. Overflow reports
    /// that overflow are dropped silently.
    pub fn dispatch(&self, event: Arc<Event>) {
        for lane in &self.lanes {
            let cause = match lane.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "queue full",
                Err(TrySendError::Closed(_)) => "worker gone",
            };
            if !event.is_monitor_overflow() {
                self.bus.publish(Event::monitor_overflow(lane.monitor, &event, cause));
            }
        }
    }

    /// True if there are no monitors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Closes every queue and awaits the workers, so queued events are still processed.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Worker loop of one monitor; a panicking handler is reported and the loop goes on.
async fn observe(monitor: Arc<dyn Monitor>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(event) = rx.recv().await {
        let handled = AssertUnwindSafe(monitor.on_event(&event)).catch_unwind().await;
        if let Err(panic) = handled {
            bus.publish(Event::monitor_panicked(monitor.name(), panic_message(&*panic)));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&'static str>()
        .map(|msg| (*msg).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Monitor for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().expect("lock").push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Exploding;

    #[async_trait]
    impl Monitor for Exploding {
        async fn on_event(&self, _event: &Event) {
            panic!("monitor blew up");
        }

        fn name(&self) -> &'static str {
            "exploding"
        }
    }

    #[tokio::test]
    async fn test_events_reach_monitor_in_order() {
        let bus = Bus::new(16);
        let recorder = Arc::new(Recorder::default());
        let set = MonitorSet::new(vec![recorder.clone()], bus, &Handle::current());

        set.dispatch(Arc::new(Event::new(EventKind::OperationStarted)));
        set.dispatch(Arc::new(Event::new(EventKind::OperationFinished)));
        set.shutdown().await;

        let seen = recorder.seen.lock().expect("lock").clone();
        assert_eq!(
            seen,
            vec![EventKind::OperationStarted, EventKind::OperationFinished]
        );
    }

    #[tokio::test]
    async fn test_panicking_monitor_is_isolated_and_reported() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let recorder = Arc::new(Recorder::default());
        let set = MonitorSet::new(
            vec![Arc::new(Exploding), recorder.clone()],
            bus,
            &Handle::current(),
        );
        assert!(!set.is_empty());

        set.dispatch(Arc::new(Event::new(EventKind::OperationStarted)));
        set.shutdown().await;

        let ev = rx.recv().await.expect("panic event");
        assert_eq!(ev.kind, EventKind::MonitorPanicked);
        assert_eq!(ev.source.as_deref(), Some("exploding"));
        assert_eq!(ev.reason.as_deref(), Some("monitor blew up"));
        assert_eq!(recorder.seen.lock().expect("lock").len(), 1);
    }

    /// Holds one event at a time.
    struct Narrow;

    #[async_trait]
    impl Monitor for Narrow {
        async fn on_event(&self, _event: &Event) {}

        fn name(&self) -> &'static str {
            "narrow"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_event_and_reports_overflow() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let recorder = Arc::new(Recorder::default());
        let set = MonitorSet::new(
            vec![Arc::new(Narrow), recorder.clone()],
            bus,
            &Handle::current(),
        );

        // Workers have not run yet, so the narrow queue is full after the first event.
        set.dispatch(Arc::new(Event::new(EventKind::OperationStarted)));
        let dropped = Event::new(EventKind::OperationFinished).with_invocation(7);
        let dropped_seq = dropped.seq;
        set.dispatch(Arc::new(dropped));

        let ev = rx.recv().await.expect("overflow event");
        assert_eq!(ev.kind, EventKind::MonitorOverflow);
        assert_eq!(ev.source.as_deref(), Some("narrow"));
        assert_eq!(ev.invocation, Some(7));
        assert_eq!(
            ev.reason.as_deref(),
            Some(format!("queue full: dropped OperationFinished #{dropped_seq}").as_str())
        );

        // A repeated overflow report is not reported again.
        set.dispatch(Arc::new(ev.clone()));
        set.shutdown().await;
        assert!(rx.try_recv().is_err());
        assert_eq!(recorder.seen.lock().expect("lock").len(), 3);
    }
}
