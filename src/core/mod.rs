//! Runtime core: composition root and invocation execution.
//!
//! The public API from this module is [`Runtime`] (built with [`RuntimeBuilder`]) and
//! its [`RuntimeConfig`].
//!
//! Internal modules:
//! - [`runner`]: executes one invocation with timeout/cancellation and event publishing;
//! - `runtime`: owns the bus, root token, and in-flight tracking; handles shutdown;
//! - `builder`: wires the monitor listener and resolves the executor.

mod builder;
mod config;
pub(crate) mod runner;
mod runtime;

pub use builder::RuntimeBuilder;
pub use config::RuntimeConfig;
pub use runner::run_with_timeout;
pub use runtime::Runtime;
