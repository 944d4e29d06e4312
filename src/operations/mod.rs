//! # Operation protocols.
//!
//! This module provides the two shapes business logic implements:
//! - [`Operation`]: options in, one result (or error) out
//! - [`StreamingOperation`]: options in, snapshots out, then one terminal outcome
//! - [`OperationFn`]: closure-backed [`Operation`]
//! - [`OperationRef`]: shared `Arc<dyn Operation>` handle
//!
//! Both traits use associated types for options and results; implementations are
//! resolved statically or through trait objects, never by reflection.

mod operation;
mod operation_fn;
mod streaming;

pub use operation::{Operation, OperationRef};
pub use operation_fn::OperationFn;
pub use streaming::StreamingOperation;
