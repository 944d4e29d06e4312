//! # Single-result operations.
//!
//! This module defines the [`Operation`] trait: given options, asynchronously
//! produce one result or fail. Every [`StreamingOperation`] is also an `Operation`
//! through a blanket bridge that drains the stream and returns its last snapshot.
//!
//! The common handle type is [`OperationRef`], an `Arc<dyn Operation>` suitable for
//! injecting into orchestrators.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::runner;
use crate::error::OperationError;
use crate::operations::StreamingOperation;
use crate::progress::DEFAULT_CAPACITY;

/// # Asynchronous unit of business logic with one terminal outcome.
///
/// Operations hold no per-call mutable state: one instance may serve many
/// concurrent calls, and each call owns only its `options`.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use uniflow::{Operation, OperationError};
///
/// struct CountLines;
///
/// #[async_trait]
/// impl Operation for CountLines {
///     type Options = String;
///     type Output = usize;
///
///     fn name(&self) -> &str { "count-lines" }
///
///     async fn run(&self, text: String) -> Result<usize, OperationError> {
///         Ok(text.lines().count())
///     }
/// }
/// ```
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    /// Immutable input, created by the caller right before invocation.
    type Options: Send + 'static;
    /// The single final value.
    type Output: Send + 'static;

    /// Returns a stable, human-readable operation name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Executes the operation once.
    async fn run(&self, options: Self::Options) -> Result<Self::Output, OperationError>;
}

/// Shared handle to an operation.
pub type OperationRef<O, R> = Arc<dyn Operation<Options = O, Output = R>>;

/// Every streaming operation is usable as a plain operation: `run` consumes the
/// whole stream and returns the last snapshot.
#[async_trait]
impl<T> Operation for T
where
    T: StreamingOperation,
{
    type Options = T::Options;
    type Output = T::State;

    fn name(&self) -> &str {
        self.label()
    }

    async fn run(&self, options: T::Options) -> Result<T::State, OperationError> {
        runner::run_to_last(self, options, DEFAULT_CAPACITY).await
    }
}
