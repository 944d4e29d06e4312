//! # Consumer half of a progress channel.
//!
//! [`Progress`] is a [`Stream`] of `Result<S, OperationError>`:
//! every `Ok` is a snapshot, an `Err` is the terminal failure and is always the
//! last item, and the stream ends (`None`) after a successful finish.
//!
//! ```text
//! emit(a) emit(b) finish()        →  Ok(a), Ok(b), None
//! emit(a) fail(e)                 →  Ok(a), Err(e), None
//! emit(a) <emitter dropped>       →  Ok(a), Err(Abandoned), None
//! cancel()                        →  None (no error: cancellation is not a failure)
//! ```
//!
//! Dropping a `Progress` cancels it.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::Stream;
use futures::StreamExt;
use futures::stream::FusedStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::Signal;
use crate::error::OperationError;

/// Single-consumer side of a progress channel.
#[derive(Debug)]
pub struct Progress<S> {
    rx: mpsc::Receiver<Signal<S>>,
    token: CancellationToken,
    done: bool,
}

impl<S> Progress<S> {
    pub(super) fn new(rx: mpsc::Receiver<Signal<S>>, token: CancellationToken) -> Self {
        Self {
            rx,
            token,
            done: false,
        }
    }

    /// Waits for the next item; `None` once the stream terminated or was cancelled.
    pub async fn recv(&mut self) -> Option<Result<S, OperationError>> {
        self.next().await
    }

    /// Stops consuming; the producer observes it at its next suspension point.
    ///
    /// Idempotent: cancelling twice is a no-op.
    pub fn cancel(&mut self) {
        if self.token.is_cancelled() && self.done {
            return;
        }
        self.token.cancel();
        self.rx.close();
        self.done = true;
    }

    /// True once [`cancel`](Self::cancel) was called (or the producer was cancelled upstream).
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drains the stream and returns the last snapshot.
    ///
    /// A terminal failure is returned as `Err`; a stream that finished without a
    /// single snapshot yields [`OperationError::Empty`].
    pub async fn last(mut self) -> Result<S, OperationError> {
        let mut last = None;
        while let Some(item) = self.next().await {
            last = Some(item?);
        }
        last.ok_or(OperationError::Empty)
    }
}

impl<S> Stream for Progress<S> {
    type Item = Result<S, OperationError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.token.is_cancelled() {
            this.done = true;
            return Poll::Ready(None);
        }
        match ready!(this.rx.poll_recv(cx)) {
            Some(Signal::State(state)) => Poll::Ready(Some(Ok(state))),
            Some(Signal::Finished) => {
                this.done = true;
                Poll::Ready(None)
            }
            Some(Signal::Failed(err)) => {
                this.done = true;
                Poll::Ready(Some(Err(err)))
            }
            None => {
                this.done = true;
                if this.token.is_cancelled() {
                    return Poll::Ready(None);
                }
                tracing::warn!("progress producer dropped without a terminal signal");
                Poll::Ready(Some(Err(OperationError::Abandoned)))
            }
        }
    }
}

impl<S> FusedStream for Progress<S> {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

impl<S> Drop for Progress<S> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
