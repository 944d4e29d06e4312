//! # Pipeline orchestrator.
//!
//! A [`Pipeline`] is a [`StreamingOperation`] assembled from ordered stages. It folds
//! every stage result into one snapshot and emits exactly one snapshot per stage.
//!
//! ## Flow of one invocation
//! ```text
//! validate(options) ── Err ──► InvalidOptions (no snapshot)
//! snapshot = seed(options)
//! for stage in stages (declaration order):
//!   ├─ Step:     snapshot = step(options, snapshot)          ── Err ─► Step{name, cause}
//!   ├─ Parallel: patches  = join(parts(options, snapshot))   ── any Err ─► Step{name, cause}
//!   │            snapshot = patches applied in declaration order
//!   ├─ invariant(snapshot)                                   ── Err ─► Inconsistent{name}
//!   └─ emit(snapshot)                                        ── consumer gone ─► stop
//! ```
//!
//! A failing stage never emits: the stream ends with the error, and the last delivered
//! snapshot stays the last consistent one.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use super::stage::{Part, Stage, StepFn};
use crate::error::{BuildError, OperationError};
use crate::operations::{OperationRef, StreamingOperation};
use crate::progress::Emitter;

type SeedFn<O, S> = Arc<dyn Fn(&O) -> S + Send + Sync>;
type ValidateFn<O> = Arc<dyn Fn(&O) -> Result<(), OperationError> + Send + Sync>;
type InvariantFn<S> = Arc<dyn Fn(&S) -> Result<(), String> + Send + Sync>;

/// Multi-stage orchestrator emitting one consistent snapshot per stage.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use uniflow::{OperationError, Pipeline, StreamingOperation};
///
/// #[derive(Clone, Debug, Default, PartialEq)]
/// struct Import { rows: usize, checked: bool }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let import = Pipeline::builder("import", |_: &String| Import::default())
///     .step("load", |path: Arc<String>, mut s: Import| async move {
///         s.rows = path.len();
///         Ok::<_, OperationError>(s)
///     })
///     .step("check", |_, mut s: Import| async move {
///         s.checked = true;
///         Ok(s)
///     })
///     .build()
///     .unwrap();
///
/// let last = Arc::new(import).stream("data.csv".to_string()).last().await;
/// assert_eq!(last, Ok(Import { rows: 8, checked: true }));
/// # }
/// ```
pub struct Pipeline<O, S> {
    name: Cow<'static, str>,
    seed: SeedFn<O, S>,
    validate: Option<ValidateFn<O>>,
    invariant: Option<InvariantFn<S>>,
    stages: Arc<[Stage<O, S>]>,
}

impl<O, S> Clone for Pipeline<O, S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            seed: self.seed.clone(),
            validate: self.validate.clone(),
            invariant: self.invariant.clone(),
            stages: self.stages.clone(),
        }
    }
}

impl<O, S> Pipeline<O, S>
where
    O: Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    /// Starts a pipeline whose initial snapshot is derived from the options.
    pub fn builder<F>(name: impl Into<Cow<'static, str>>, seed: F) -> PipelineBuilder<O, S>
    where
        F: Fn(&O) -> S + Send + Sync + 'static,
    {
        PipelineBuilder {
            name: name.into(),
            seed: Arc::new(seed),
            validate: None,
            invariant: None,
            stages: Vec::new(),
        }
    }

    /// Stage names in execution order.
    pub fn stages(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name().as_ref())
    }
}

#[async_trait]
impl<O, S> StreamingOperation for Pipeline<O, S>
where
    O: Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    type Options = O;
    type State = S;

    fn label(&self) -> &str {
        &self.name
    }

    fn validate(&self, options: &O) -> Result<(), OperationError> {
        match &self.validate {
            Some(check) => check(options),
            None => Ok(()),
        }
    }

    async fn drive(&self, options: O, progress: &Emitter<S>) -> Result<(), OperationError> {
        let options = Arc::new(options);
        let mut snapshot = (self.seed)(&options);

        for stage in self.stages.iter() {
            let name = stage.name();
            tracing::debug!(pipeline = %self.name, stage = %name, "stage starting");

            snapshot = stage.apply(&options, snapshot).await?;
            if let Some(check) = &self.invariant {
                check(&snapshot).map_err(|reason| OperationError::Inconsistent {
                    step: name.clone(),
                    reason: reason.into(),
                })?;
            }
            if !progress.emit(snapshot.clone()).await {
                tracing::debug!(pipeline = %self.name, stage = %name, "consumer gone; stopping");
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`Pipeline`].
pub struct PipelineBuilder<O, S> {
    name: Cow<'static, str>,
    seed: SeedFn<O, S>,
    validate: Option<ValidateFn<O>>,
    invariant: Option<InvariantFn<S>>,
    stages: Vec<Stage<O, S>>,
}

impl<O, S> PipelineBuilder<O, S>
where
    O: Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    /// Rejects options before any stage runs.
    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&O) -> Result<(), OperationError> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Consistency check applied to every snapshot before it is emitted.
    pub fn invariant<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> Result<(), String> + Send + Sync + 'static,
    {
        self.invariant = Some(Arc::new(f));
        self
    }

    /// Appends a sequential step computing the next snapshot from the current one.
    pub fn step<F, Fut>(mut self, name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(Arc<O>, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, OperationError>> + Send + 'static,
    {
        let run: StepFn<O, S> =
            Arc::new(move |options: Arc<O>, snapshot: S| f(options, snapshot).boxed());
        self.stages.push(Stage::Step {
            name: name.into(),
            run,
        });
        self
    }

    /// Appends a step that calls an injected sub-operation.
    ///
    /// `request` builds the sub-operation's options; `fold` merges its output
    /// into the snapshot.
    pub fn call<I, R, Req, Fold>(
        self,
        name: impl Into<Arc<str>>,
        op: OperationRef<I, R>,
        request: Req,
        fold: Fold,
    ) -> Self
    where
        I: Send + 'static,
        R: Send + 'static,
        Req: Fn(&O, &S) -> I + Send + Sync + 'static,
        Fold: Fn(S, R) -> S + Send + Sync + 'static,
    {
        let request = Arc::new(request);
        let fold = Arc::new(fold);
        self.step(name, move |options: Arc<O>, snapshot: S| {
            let op = op.clone();
            let request = request.clone();
            let fold = fold.clone();
            async move {
                let input = request(&options, &snapshot);
                let output = op.run(input).await?;
                Ok(fold(snapshot, output))
            }
        })
    }

    /// Appends a parallel stage; one snapshot is emitted after every part completes.
    pub fn parallel(
        mut self,
        name: impl Into<Arc<str>>,
        parts: impl IntoIterator<Item = Part<O, S>>,
    ) -> Self {
        self.stages.push(Stage::parallel(name.into(), parts));
        self
    }

    /// Finishes construction; a pipeline needs at least one stage.
    pub fn build(self) -> Result<Pipeline<O, S>, BuildError> {
        if self.stages.is_empty() {
            return Err(BuildError::NoStages {
                name: self.name.into_owned(),
            });
        }
        Ok(Pipeline {
            name: self.name,
            seed: self.seed,
            validate: self.validate,
            invariant: self.invariant,
            stages: self.stages.into(),
        })
    }
}
