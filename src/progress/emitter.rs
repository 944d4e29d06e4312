//! # Producer half of a progress channel.
//!
//! [`Emitter`] is handed to the code doing the work. It appends snapshots with
//! [`emit`](Emitter::emit) and closes the channel with exactly one terminal signal:
//! [`finish`](Emitter::finish), [`fail`](Emitter::fail), or [`conclude`](Emitter::conclude).
//!
//! ## Rules
//! - Terminal methods take `self`: a second terminal signal, or an `emit` after one,
//!   does not compile.
//! - `emit` after the consumer cancelled is a no-op returning `false`.
//! - The bounded buffer applies backpressure: `emit` suspends while the consumer is
//!   behind, and wakes up immediately if the consumer cancels meanwhile.
//! - Dropping an emitter without a terminal signal is reported to the consumer as
//!   [`OperationError::Abandoned`].

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::Signal;
use crate::error::OperationError;

/// Single-producer side of a progress channel.
#[derive(Debug)]
pub struct Emitter<S> {
    tx: mpsc::Sender<Signal<S>>,
    token: CancellationToken,
    emitted: AtomicU64,
}

impl<S: Send> Emitter<S> {
    pub(super) fn new(tx: mpsc::Sender<Signal<S>>, token: CancellationToken) -> Self {
        Self {
            tx,
            token,
            emitted: AtomicU64::new(0),
        }
    }

    /// Appends a snapshot.
    ///
    /// Returns `true` if the snapshot was queued for the consumer, `false` if the
    /// consumer is gone (in which case the producer should stop working).
    pub async fn emit(&self, state: S) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            res = self.tx.send(Signal::State(state)) => match res {
                Ok(()) => {
                    self.emitted.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(_closed) => false,
            },
        }
    }

    /// True once the consumer cancelled or dropped its [`Progress`](super::Progress).
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves when the consumer cancels; use it in `select!` around long awaits.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Number of snapshots queued so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Terminates the stream successfully.
    pub async fn finish(self) {
        self.terminate(Signal::Finished).await;
    }

    /// Terminates the stream with `error`.
    pub async fn fail(self, error: OperationError) {
        self.terminate(Signal::Failed(error)).await;
    }

    /// Terminates the stream according to `result`.
    pub async fn conclude(self, result: Result<(), OperationError>) {
        match result {
            Ok(()) => self.finish().await,
            Err(e) => self.fail(e).await,
        }
    }

    async fn terminate(self, signal: Signal<S>) {
        if self.token.is_cancelled() {
            return;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {}
            _ = self.tx.send(signal) => {}
        }
    }
}
