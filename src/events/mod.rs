//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by invocations, stores,
//! and monitor workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `core::runner::drive`, `Runtime::run`, `Store` writer tasks,
//!   `MonitorSet` workers (overflow/panic), `Runtime::shutdown`.
//! - **Consumers**: the runtime's monitor listener (fans out to `MonitorSet`).

mod bus;
mod event;

pub(crate) use bus::{Bus, publish_opt};
pub(crate) use event::next_invocation_id;
pub use event::{Event, EventKind};
