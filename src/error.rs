//! Error types used by the uniflow runtime and operations.
//!
//! This module defines three error enums:
//!
//! - [`OperationError`]: terminal failures of an operation invocation.
//! - [`BuildError`]: failures detected while constructing runtime pieces.
//! - [`RuntimeError`]: failures of the runtime's own lifecycle (shutdown).
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//!
//! Cancellation is deliberately absent from both enums: a cancelled stream simply
//! stops delivering values and is never reported as an error.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// # Terminal failure of an operation invocation.
///
/// Delivered exactly once, as the last item of a [`Progress`](crate::Progress)
/// stream or as the `Err` of [`Operation::run`](crate::Operation::run).
///
/// The type is `Clone` so that a failure can be retained inside broadcast
/// presentation state (see [`PresentationState::Failed`](crate::PresentationState::Failed)).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    /// Options were rejected before any work started; no snapshot was emitted.
    #[error("invalid options: {reason}")]
    InvalidOptions {
        /// Why the options were rejected.
        reason: Arc<str>,
    },

    /// A step of an orchestrated sequence failed.
    #[error("step `{step}` failed: {source}")]
    Step {
        /// Name of the failing step.
        step: Arc<str>,
        /// The underlying failure.
        source: Box<OperationError>,
    },

    /// Execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: Arc<str>,
    },

    /// A snapshot produced by a step violated the orchestrator's invariant and was not emitted.
    #[error("inconsistent snapshot after `{step}`: {reason}")]
    Inconsistent {
        /// Step that produced the snapshot.
        step: Arc<str>,
        /// Invariant violation details.
        reason: Arc<str>,
    },

    /// Invocation exceeded its timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The producer went away without sending a terminal signal.
    #[error("progress channel closed without a terminal signal")]
    Abandoned,

    /// A stream bridged into a single result finished without emitting anything.
    #[error("stream finished without emitting a snapshot")]
    Empty,
}

impl OperationError {
    /// Shorthand for [`OperationError::Fail`].
    pub fn fail(error: impl Into<Arc<str>>) -> Self {
        OperationError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`OperationError::InvalidOptions`].
    pub fn invalid(reason: impl Into<Arc<str>>) -> Self {
        OperationError::InvalidOptions {
            reason: reason.into(),
        }
    }

    /// Wraps `self` as the failure of `step`.
    ///
    /// An error that already names a step is returned unchanged, so nested
    /// orchestrators report the innermost step.
    pub fn in_step(self, step: impl Into<Arc<str>>) -> Self {
        match self {
            OperationError::Step { .. } | OperationError::Inconsistent { .. } => self,
            other => OperationError::Step {
                step: step.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, unwrapping [`OperationError::Step`] layers.
    pub fn root_cause(&self) -> &OperationError {
        match self {
            OperationError::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the failing step name, if the error carries one.
    pub fn step(&self) -> Option<&str> {
        match self {
            OperationError::Step { step, .. } | OperationError::Inconsistent { step, .. } => {
                Some(step)
            }
            _ => None,
        }
    }

    /// True for errors raised before any work started.
    pub fn is_input_error(&self) -> bool {
        matches!(self, OperationError::InvalidOptions { .. })
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use uniflow::OperationError;
    ///
    /// let err = OperationError::fail("connection refused").in_step("fetch");
    /// assert_eq!(err.as_label(), "operation_step_failed");
    /// assert_eq!(err.root_cause().as_label(), "operation_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            OperationError::InvalidOptions { .. } => "operation_invalid_options",
            OperationError::Step { .. } => "operation_step_failed",
            OperationError::Fail { .. } => "operation_failed",
            OperationError::Inconsistent { .. } => "operation_inconsistent",
            OperationError::Timeout { .. } => "operation_timeout",
            OperationError::Abandoned => "operation_abandoned",
            OperationError::Empty => "operation_empty",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            OperationError::InvalidOptions { reason } => format!("invalid options: {reason}"),
            OperationError::Step { step, source } => {
                format!("step={step}; {}", source.as_message())
            }
            OperationError::Fail { error } => format!("error: {error}"),
            OperationError::Inconsistent { step, reason } => {
                format!("inconsistent after step={step}: {reason}")
            }
            OperationError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            OperationError::Abandoned => "producer dropped without terminal signal".to_string(),
            OperationError::Empty => "no snapshot emitted".to_string(),
        }
    }
}

/// # Errors raised while constructing runtime pieces.
///
/// Construction-time failures: a missing dependency or missing executor is
/// reported here, never mid-stream.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// No tokio runtime is reachable for the requested confinement.
    #[error("no async runtime available for confinement")]
    NoRuntime,

    /// A required dependency was not injected.
    #[error("missing dependency `{name}`")]
    MissingDependency {
        /// Name of the missing dependency.
        name: &'static str,
    },

    /// A pipeline was built without any stage.
    #[error("pipeline `{name}` has no stages")]
    NoStages {
        /// Pipeline name.
        name: String,
    },
}

impl BuildError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::NoRuntime => "build_no_runtime",
            BuildError::MissingDependency { .. } => "build_missing_dependency",
            BuildError::NoStages { .. } => "build_no_stages",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BuildError::NoRuntime => "no tokio runtime reachable".to_string(),
            BuildError::MissingDependency { name } => format!("dependency={name} not provided"),
            BuildError::NoStages { name } => format!("pipeline={name} is empty"),
        }
    }
}

/// # Errors produced by the runtime lifecycle.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Shutdown grace period elapsed while invocations were still running.
    #[error("shutdown grace {grace:?} exceeded; {in_flight} invocation(s) still running")]
    GraceExceeded {
        /// Configured grace period.
        grace: Duration,
        /// Invocations that had not stopped.
        in_flight: usize,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// Unwraps an injected dependency or fails construction.
///
/// # Example
/// ```
/// use uniflow::{require, BuildError};
///
/// let token: Option<String> = None;
/// assert_eq!(
///     require("api_token", token),
///     Err(BuildError::MissingDependency { name: "api_token" })
/// );
/// ```
pub fn require<T>(name: &'static str, dep: Option<T>) -> Result<T, BuildError> {
    dep.ok_or(BuildError::MissingDependency { name })
}
