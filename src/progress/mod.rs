//! # Progress channel: snapshots plus one terminal signal, one producer, one consumer.
//!
//! ```text
//!   producer task                                   consumer
//!   ─────────────                                   ────────
//!   Emitter::emit(s1) ──► [bounded queue] ──► Progress::next() → Ok(s1)
//!   Emitter::emit(s2) ──►                 ──► Progress::next() → Ok(s2)
//!   Emitter::finish() ──►                 ──► Progress::next() → None
//!
//!   Progress::cancel() / drop ──► CancellationToken ──► Emitter::emit → false
//!                                                    └─► runner drops the producer future
//! ```
//!
//! ## Guarantees
//! - FIFO: values arrive in emission order, each exactly once.
//! - Exactly one terminal: finish/fail consume the emitter.
//! - Cancellation is observable by the producer within one suspension point.
//!
//! ## Example
//! ```rust
//! use futures::StreamExt;
//! use uniflow::progress;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (emitter, mut progress) = progress::channel::<u32>(4);
//! tokio::spawn(async move {
//!     for step in 1..=3 {
//!         if !emitter.emit(step).await {
//!             return;
//!         }
//!     }
//!     emitter.finish().await;
//! });
//!
//! let mut seen = Vec::new();
//! while let Some(item) = progress.next().await {
//!     seen.push(item.unwrap());
//! }
//! assert_eq!(seen, vec![1, 2, 3]);
//! # }
//! ```

mod emitter;
mod stream;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::OperationError;

pub use emitter::Emitter;
pub use stream::Progress;

/// Default buffer of a progress channel.
pub const DEFAULT_CAPACITY: usize = 32;

/// Message carried by the channel.
#[derive(Debug)]
pub(crate) enum Signal<S> {
    State(S),
    Finished,
    Failed(OperationError),
}

/// Creates a progress channel buffering up to `capacity` snapshots (clamped to at least 1).
pub fn channel<S: Send>(capacity: usize) -> (Emitter<S>, Progress<S>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let token = CancellationToken::new();
    (Emitter::new(tx, token.clone()), Progress::new(rx, token))
}

/// Creates a progress channel whose cancellation also follows `parent`.
///
/// Cancelling `parent` (e.g. runtime shutdown) cancels the channel; cancelling the
/// channel never touches `parent`.
pub(crate) fn child_channel<S: Send>(
    capacity: usize,
    parent: &CancellationToken,
) -> (Emitter<S>, Progress<S>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let token = parent.child_token();
    (Emitter::new(tx, token.clone()), Progress::new(rx, token))
}
