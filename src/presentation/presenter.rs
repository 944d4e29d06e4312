//! # Presenter: the subscriber side of one use case.
//!
//! A [`Presenter`] consumes an operation's progress stream, maps every snapshot through
//! its [`Projection`], and publishes the resulting [`PresentationState`] through a
//! [`Store`], so any number of observers can watch it independently.
//!
//! ## Supersession
//! ```text
//! perform(A) ──► generation 1 ──► begin, advance, advance ...
//! perform(B) ──► generation 2 ──► cancels A's stream ──► begin, advance, complete
//!                                   └► A returns Outcome::Superseded
//! ```
//! Supersession is ordered through the store's command queue. An invocation's `begin`
//! marks its generation active on the writer; later updates apply only while that
//! generation is still active. Updates queued before a newer `begin` still apply in
//! order, so back-to-back invocations never lose each other's terminal state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::{PresentationState, Projection};
use crate::broadcast::{Store, StoreConfig, Subscription};
use crate::core::runner::{self, Invocation};
use crate::error::{BuildError, OperationError};
use crate::operations::StreamingOperation;
use crate::progress::Progress;

/// How one [`Presenter::perform`] call ended.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The stream finished; the state is `Ready` (or `Failed(Empty)` if nothing was emitted).
    Completed,
    /// The stream failed; the state is `Failed` with the prior view retained.
    Failed(OperationError),
    /// A newer invocation took over; this one left the state untouched.
    Superseded,
    /// Cancelled through [`Presenter::cancel`] or runtime shutdown.
    Cancelled,
}

struct Inflight {
    /// Latest generation handed out; written by callers.
    issued: AtomicU64,
    /// Generation whose `begin` the writer applied last; written only by the writer.
    active: AtomicU64,
    current: Mutex<Option<(u64, CancellationToken)>>,
}

/// Long-lived owner of a [`PresentationState`].
pub struct Presenter<P: Projection> {
    store: Store<PresentationState<P::View>>,
    inflight: Arc<Inflight>,
    invocation: Invocation,
}

impl<P: Projection> Clone for Presenter<P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            inflight: self.inflight.clone(),
            invocation: self.invocation.clone(),
        }
    }
}

impl<P: Projection> Presenter<P> {
    /// Creates a presenter in the `Uninitialized` state.
    pub fn new(name: impl Into<Arc<str>>, config: StoreConfig) -> Result<Self, BuildError> {
        let store = Store::new(name, PresentationState::Uninitialized, config)?;
        Ok(Self::with_store(store, Invocation::default()))
    }

    pub(crate) fn with_store(
        store: Store<PresentationState<P::View>>,
        invocation: Invocation,
    ) -> Self {
        Self {
            store,
            inflight: Arc::new(Inflight {
                issued: AtomicU64::new(0),
                active: AtomicU64::new(0),
                current: Mutex::new(None),
            }),
            invocation,
        }
    }

    /// Starts `op` and follows its stream until it ends or is superseded.
    pub async fn perform<O>(&self, op: Arc<O>, options: O::Options) -> Outcome
    where
        O: StreamingOperation<State = P::Snapshot>,
    {
        let progress = runner::spawn(op, options, self.invocation.clone());
        self.follow(progress).await
    }

    /// Follows an already started stream.
    pub async fn follow(&self, mut progress: Progress<P::Snapshot>) -> Outcome {
        let token = CancellationToken::new();
        let generation = {
            let mut current = self.lock();
            let generation = self.inflight.issued.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((_, previous)) = current.replace((generation, token.clone())) {
                previous.cancel();
            }
            // Queued under the lock so `begin`s reach the writer in generation order.
            self.begin(generation);
            generation
        };

        loop {
            let item = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    progress.cancel();
                    return self.interrupted(generation).await;
                }
                item = progress.recv() => item,
            };

            match item {
                Some(Ok(snapshot)) => {
                    self.apply(generation, move |s| s.advance::<P>(snapshot));
                }
                Some(Err(error)) => {
                    let terminal = error.clone();
                    let applied = self.conclude(generation, move |s| s.fail(terminal)).await;
                    return if applied {
                        Outcome::Failed(error)
                    } else {
                        Outcome::Superseded
                    };
                }
                None if progress.is_cancelled() => return self.interrupted(generation).await,
                None => {
                    let applied = self.conclude(generation, PresentationState::complete).await;
                    return if applied {
                        Outcome::Completed
                    } else {
                        Outcome::Superseded
                    };
                }
            }
        }
    }

    /// Cancels the in-flight invocation, if any; the state falls back to the last good view.
    pub fn cancel(&self) {
        if let Some((_, token)) = self.lock().take() {
            token.cancel();
        }
    }

    /// Opens an independent subscription to the presentation state.
    pub fn observe(&self) -> Subscription<PresentationState<P::View>> {
        self.store.observe()
    }

    /// Current state, after all previously issued updates.
    pub async fn state(&self) -> Option<PresentationState<P::View>> {
        self.store.get().await
    }

    /// Underlying store.
    pub fn store(&self) -> &Store<PresentationState<P::View>> {
        &self.store
    }

    fn begin(&self, generation: u64) {
        let inflight = self.inflight.clone();
        self.store.update_if(move |state| {
            if inflight.active.load(Ordering::SeqCst) > generation {
                return None;
            }
            inflight.active.store(generation, Ordering::SeqCst);
            Some(state.clone().begin())
        });
    }

    fn apply<F>(&self, generation: u64, transition: F)
    where
        F: FnOnce(PresentationState<P::View>) -> PresentationState<P::View> + Send + 'static,
    {
        let inflight = self.inflight.clone();
        self.store.update_if(move |state| {
            (inflight.active.load(Ordering::SeqCst) == generation)
                .then(|| transition(state.clone()))
        });
    }

    /// Applies a terminal transition and waits for the writer to report whether it landed.
    ///
    /// `false` when a newer invocation began first, or the writer is gone.
    async fn conclude<F>(&self, generation: u64, transition: F) -> bool
    where
        F: FnOnce(PresentationState<P::View>) -> PresentationState<P::View> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let inflight = self.inflight.clone();
        self.store.update_if(move |state| {
            let current = inflight.active.load(Ordering::SeqCst) == generation;
            let _ = tx.send(current);
            current.then(|| transition(state.clone()))
        });
        let applied = rx.await.unwrap_or(false);
        self.settle(generation);
        applied
    }

    async fn interrupted(&self, generation: u64) -> Outcome {
        if self.inflight.issued.load(Ordering::SeqCst) != generation {
            return Outcome::Superseded;
        }
        if self.conclude(generation, PresentationState::abort).await {
            Outcome::Cancelled
        } else {
            Outcome::Superseded
        }
    }

    fn settle(&self, generation: u64) {
        let mut current = self.lock();
        if matches!(&*current, Some((g, _)) if *g == generation) {
            *current = None;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<(u64, CancellationToken)>> {
        self.inflight
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::Identity;

    #[tokio::test]
    async fn test_terminal_after_newer_begin_is_discarded() {
        let p: Presenter<Identity<u32>> =
            Presenter::new("screen", StoreConfig::default()).expect("presenter");
        p.begin(1);
        p.apply(1, |s| s.advance::<Identity<u32>>(5));
        p.begin(2);

        assert!(!p.conclude(1, PresentationState::complete).await);
        assert_eq!(
            p.state().await,
            Some(PresentationState::Loading { prior: None })
        );
        assert!(p.conclude(2, PresentationState::complete).await);
    }

    #[tokio::test]
    async fn test_updates_queued_before_newer_begin_still_apply() {
        let p: Presenter<Identity<u32>> =
            Presenter::new("screen", StoreConfig::default()).expect("presenter");
        p.begin(1);
        p.apply(1, |s| s.advance::<Identity<u32>>(3));
        p.apply(1, PresentationState::complete);
        p.begin(2);

        assert_eq!(
            p.state().await,
            Some(PresentationState::Loading { prior: Some(3) })
        );
    }
}
