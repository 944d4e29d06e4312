//! # Runtime event monitor trait.
//!
//! Provides [`Monitor`], an extension point for plugging custom event handlers into the runtime.
//!
//! Each monitor gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-monitor bounded queue** (capacity via [`Monitor::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported as `EventKind::MonitorPanicked`)
//!
//! ## Rules
//! - A slow monitor only affects its own queue.
//! - Queue overflow drops the event **for this monitor only** and publishes
//!   `EventKind::MonitorOverflow`; other monitors are unaffected.
//! - Events are processed sequentially (FIFO) per monitor.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use async_trait::async_trait;
//! use uniflow::{Event, EventKind, Monitor};
//!
//! #[derive(Default)]
//! struct FailureCounter(AtomicU64);
//!
//! #[async_trait]
//! impl Monitor for FailureCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::OperationFailed) {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "failures" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Observer of runtime lifecycle events.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Monitor: Send + Sync + 'static {
    /// Processes a single event, called from the monitor's own worker task.
    async fn on_event(&self, event: &Event);

    /// Returns the monitor name used in overflow/panic events.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this monitor (clamped to at least 1).
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
