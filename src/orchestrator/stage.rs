//! Stages of a [`Pipeline`](super::Pipeline): one sequential step or one parallel fork.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};

use crate::error::OperationError;

/// Partial result of one parallel part, folded into the stage snapshot once every
/// part of the stage has completed.
pub type Patch<S> = Box<dyn FnOnce(&mut S) + Send>;

pub(super) type StepFn<O, S> =
    Arc<dyn Fn(Arc<O>, S) -> BoxFuture<'static, Result<S, OperationError>> + Send + Sync>;

type PartFn<O, S> =
    Arc<dyn Fn(Arc<O>, S) -> BoxFuture<'static, Result<Patch<S>, OperationError>> + Send + Sync>;

/// One branch of a parallel stage.
///
/// A part sees the snapshot as it was when the stage started and returns a [`Patch`]
/// instead of a whole snapshot, so concurrent parts never overwrite each other.
pub struct Part<O, S> {
    run: PartFn<O, S>,
}

impl<O, S> Part<O, S>
where
    O: Send + Sync + 'static,
    S: Send + 'static,
{
    /// Wraps an async closure producing a patch.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<O>, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Patch<S>, OperationError>> + Send + 'static,
    {
        Self {
            run: Arc::new(move |options: Arc<O>, snapshot: S| f(options, snapshot).boxed()),
        }
    }
}

pub(super) enum Stage<O, S> {
    Step {
        name: Arc<str>,
        run: StepFn<O, S>,
    },
    Parallel {
        name: Arc<str>,
        parts: Vec<PartFn<O, S>>,
    },
}

impl<O, S> Stage<O, S>
where
    O: Send + Sync + 'static,
    S: Clone + Send + 'static,
{
    pub(super) fn parallel(name: Arc<str>, parts: impl IntoIterator<Item = Part<O, S>>) -> Self {
        Stage::Parallel {
            name,
            parts: parts.into_iter().map(|p| p.run).collect(),
        }
    }

    pub(super) fn name(&self) -> &Arc<str> {
        match self {
            Stage::Step { name, .. } | Stage::Parallel { name, .. } => name,
        }
    }

    /// Runs the stage and folds its result into the next snapshot.
    ///
    /// Failures come back tagged with the stage name.
    pub(super) async fn apply(&self, options: &Arc<O>, snapshot: S) -> Result<S, OperationError> {
        match self {
            Stage::Step { name, run } => run(options.clone(), snapshot)
                .await
                .map_err(|e| e.in_step(name.clone())),
            Stage::Parallel { name, parts } => {
                let patches =
                    try_join_all(parts.iter().map(|p| p(options.clone(), snapshot.clone())))
                        .await
                        .map_err(|e| e.in_step(name.clone()))?;

                // Declaration order, independent of completion order.
                let mut next = snapshot;
                for patch in patches {
                    patch(&mut next);
                }
                Ok(next)
            }
        }
    }
}
