//! # Presentation state machine.
//!
//! ```text
//!                      begin                 snapshot
//! Uninitialized ──────────────► Loading ─────────────────► Operating ◄─┐
//!  Ready / Failed ─── begin ───► (prior)                   (live,prior)─┘ snapshot
//!                                   │                         │    │
//!                          complete │ (nothing emitted)       │    │ fail(e)
//!                                   ▼                         │    ▼
//!                          Failed(Empty, prior)     complete  │  Failed(e, prior)
//!                                                             ▼
//!                                                          Ready(live)
//! ```
//!
//! Every transition is a pure function of the current state and its input. `prior`
//! always carries the last good view across a new invocation, so a retry never forces
//! a consumer to drop what it was showing.

use crate::error::OperationError;
use crate::presentation::Projection;

/// Subscriber-owned state built from an operation's snapshots.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum PresentationState<V> {
    /// Nothing has been requested yet.
    #[default]
    Uninitialized,
    /// An invocation started; no snapshot yet.
    Loading {
        /// Last good view from an earlier invocation.
        prior: Option<V>,
    },
    /// Snapshots are arriving.
    Operating {
        /// View of the latest snapshot.
        live: V,
        /// Last good view from an earlier invocation.
        prior: Option<V>,
    },
    /// The latest invocation completed with this view.
    Ready(V),
    /// The latest invocation failed.
    Failed {
        /// Terminal error of the invocation.
        error: OperationError,
        /// Last good view from an earlier invocation.
        prior: Option<V>,
    },
}

impl<V: Clone> PresentationState<V> {
    /// A new invocation started.
    pub fn begin(self) -> Self {
        PresentationState::Loading {
            prior: self.into_last_good(),
        }
    }

    /// A snapshot arrived; projects it against the last good view of an earlier invocation.
    pub fn advance<P>(self, snapshot: P::Snapshot) -> Self
    where
        P: Projection<View = V>,
    {
        match self {
            PresentationState::Loading { prior } | PresentationState::Operating { prior, .. } => {
                PresentationState::Operating {
                    live: P::project(snapshot, prior.as_ref()),
                    prior,
                }
            }
            other => other.begin().advance::<P>(snapshot),
        }
    }

    /// The stream finished successfully.
    pub fn complete(self) -> Self {
        match self {
            PresentationState::Operating { live, .. } => PresentationState::Ready(live),
            PresentationState::Loading { prior } => PresentationState::Failed {
                error: OperationError::Empty,
                prior,
            },
            settled => settled,
        }
    }

    /// The stream terminated with `error`.
    pub fn fail(self, error: OperationError) -> Self {
        match self {
            PresentationState::Loading { prior } | PresentationState::Operating { prior, .. } => {
                PresentationState::Failed { error, prior }
            }
            other => PresentationState::Failed {
                error,
                prior: other.into_last_good(),
            },
        }
    }

    /// The invocation was cancelled; falls back to the last good view.
    pub fn abort(self) -> Self {
        match self {
            PresentationState::Loading { prior } | PresentationState::Operating { prior, .. } => {
                prior.map_or(PresentationState::Uninitialized, PresentationState::Ready)
            }
            settled => settled,
        }
    }

    fn into_last_good(self) -> Option<V> {
        match self {
            PresentationState::Uninitialized => None,
            PresentationState::Ready(v) => Some(v),
            PresentationState::Loading { prior }
            | PresentationState::Operating { prior, .. }
            | PresentationState::Failed { prior, .. } => prior,
        }
    }
}

impl<V> PresentationState<V> {
    /// Last good view: the completed one, or the prior carried through a retry.
    pub fn last_good(&self) -> Option<&V> {
        match self {
            PresentationState::Uninitialized => None,
            PresentationState::Ready(v) => Some(v),
            PresentationState::Loading { prior }
            | PresentationState::Operating { prior, .. }
            | PresentationState::Failed { prior, .. } => prior.as_ref(),
        }
    }

    /// View of the in-flight invocation, if any snapshot arrived.
    pub fn live(&self) -> Option<&V> {
        match self {
            PresentationState::Operating { live, .. } => Some(live),
            _ => None,
        }
    }

    /// Terminal error of the latest invocation.
    pub fn error(&self) -> Option<&OperationError> {
        match self {
            PresentationState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// True while an invocation is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PresentationState::Loading { .. } | PresentationState::Operating { .. }
        )
    }
}
