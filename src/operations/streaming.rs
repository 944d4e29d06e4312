//! # Streaming operations.
//!
//! A [`StreamingOperation`] reports a sequence of snapshots through an
//! [`Emitter`] before its terminal outcome. Implementors write [`drive`](StreamingOperation::drive);
//! the runtime owns channel creation, task spawning, cancellation, and the terminal signal.
//!
//! ## Lifecycle of one invocation
//! ```text
//! stream(options)
//!   ├─► validate(&options) ── Err ──► Progress yields Err(InvalidOptions), no snapshots
//!   └─► spawn task:
//!         select! {
//!           consumer cancelled ─► drive future dropped (work stops at its current await)
//!           drive(options, &emitter)
//!             ├─ Ok(())  ─► finish  ─► Progress ends (None)
//!             └─ Err(e)  ─► fail(e) ─► Progress yields Err(e), then None
//!         }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::runner::{self, Invocation};
use crate::error::OperationError;
use crate::progress::{Emitter, Progress};

/// # Operation that reports progress as a stream of snapshots.
///
/// Every snapshot handed to [`Emitter::emit`] must be internally consistent on its own.
/// Failures are returned from `drive`, never emitted as values.
///
/// Through a blanket impl every `StreamingOperation` is also an
/// [`Operation`](crate::Operation) whose output is the last snapshot.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use uniflow::{Emitter, OperationError, StreamingOperation};
///
/// struct Countdown;
///
/// #[async_trait]
/// impl StreamingOperation for Countdown {
///     type Options = u32;
///     type State = u32;
///
///     fn validate(&self, from: &u32) -> Result<(), OperationError> {
///         if *from == 0 {
///             return Err(OperationError::invalid("nothing to count"));
///         }
///         Ok(())
///     }
///
///     async fn drive(&self, from: u32, progress: &Emitter<u32>) -> Result<(), OperationError> {
///         for n in (0..from).rev() {
///             if !progress.emit(n).await {
///                 break;
///             }
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait StreamingOperation: Send + Sync + 'static {
    /// Immutable input, created by the caller right before invocation.
    type Options: Send + 'static;
    /// Snapshot type; the last one doubles as the result.
    type State: Send + 'static;

    /// Returns a stable, human-readable name used in runtime events.
    fn label(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Rejects invalid options before any work starts.
    ///
    /// Default: accepts everything.
    fn validate(&self, _options: &Self::Options) -> Result<(), OperationError> {
        Ok(())
    }

    /// Performs the work, emitting one snapshot per meaningful step.
    ///
    /// Returning `Err` terminates the stream with that error. Returning early after
    /// a failed `emit` (consumer gone) is the expected reaction to cancellation.
    async fn drive(
        &self,
        options: Self::Options,
        progress: &Emitter<Self::State>,
    ) -> Result<(), OperationError>;

    /// Starts an invocation on its own tokio task and returns its progress stream.
    ///
    /// Must be called from within a tokio runtime. For event publishing, timeouts, and
    /// shutdown handling use [`Runtime::stream`](crate::Runtime::stream).
    fn stream(self: Arc<Self>, options: Self::Options) -> Progress<Self::State>
    where
        Self: Sized,
    {
        runner::spawn(self, options, Invocation::default())
    }
}
