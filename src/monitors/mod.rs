//! # Runtime event monitors.
//!
//! This module provides the [`Monitor`] trait, the internal `MonitorSet` fan-out, and
//! the built-in [`LogWriter`].
//!
//! ```text
//! Event flow:
//!   Invocation ── publish(Event) ──► Bus ──► Runtime listener ──► MonitorSet
//!                                                                    │
//!                                                    ┌───────────────┼──────────┐
//!                                                    ▼               ▼          ▼
//!                                                 LogWriter       Metrics    Custom
//! ```
//!
//! Monitors observe the runtime itself. Application state is observed through
//! [`Store`](crate::Store) subscriptions instead.

mod log;
mod monitor;
mod set;

pub use log::LogWriter;
pub use monitor::Monitor;
pub(crate) use set::MonitorSet;
