//! # Run a single invocation of an operation.
//!
//! Executes one call of a [`StreamingOperation`] (or a plain [`Operation`]) with an
//! optional timeout, publishing lifecycle events to the [`Bus`] when one is attached.
//!
//! ## Event flow
//!
//! ```text
//! Rejected options:
//!   validate() → Err → publish OperationFailed → Progress yields Err(InvalidOptions)
//!
//! Success:
//!   publish OperationStarted → drive() → Ok(()) → publish OperationFinished → finish()
//!
//! Failure:
//!   publish OperationStarted → drive() → Err(e) → publish OperationFailed → fail(e)
//!
//! Timeout:
//!   timeout exceeded → drive future dropped → publish TimeoutHit
//!                                           → publish OperationFailed → fail(Timeout)
//!
//! Cancellation (consumer cancel, consumer drop, runtime shutdown):
//!   drive future dropped at its current await → publish OperationCancelled
//!   (no terminal error is delivered: cancellation is not a failure)
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event per invocation.
//! - `TimeoutHit` is published **in addition to** `OperationFailed` on timeout.
//! - The channel token is a **child** of the parent token: cancelling one invocation
//!   never affects the runtime or other invocations.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::OperationError;
use crate::events::{Bus, Event, EventKind, next_invocation_id, publish_opt};
use crate::operations::{Operation, StreamingOperation};
use crate::progress::{self, DEFAULT_CAPACITY, Emitter, Progress};

/// Per-invocation settings resolved by the caller (a [`Runtime`](crate::Runtime) or a bare `stream`).
#[derive(Clone, Debug)]
pub(crate) struct Invocation {
    /// Progress channel buffer.
    pub capacity: usize,
    /// Optional timeout (`None` or zero = no timeout).
    pub timeout: Option<Duration>,
    /// Parent token (runtime shutdown); `None` = standalone.
    pub parent: Option<CancellationToken>,
    /// Event bus; `None` = no events.
    pub bus: Option<Bus>,
    /// Executor for the invocation task; `None` = `tokio::spawn`.
    pub handle: Option<Handle>,
    /// Tracks in-flight invocations for the shutdown drain.
    pub tracker: Option<TaskTracker>,
}

impl Default for Invocation {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            timeout: None,
            parent: None,
            bus: None,
            handle: None,
            tracker: None,
        }
    }
}

/// Spawns one invocation of `op` and returns the consumer side of its progress channel.
pub(crate) fn spawn<S>(op: Arc<S>, options: S::Options, inv: Invocation) -> Progress<S::State>
where
    S: StreamingOperation + ?Sized,
{
    let (emitter, progress) = match &inv.parent {
        Some(parent) => progress::child_channel(inv.capacity, parent),
        None => progress::channel(inv.capacity),
    };
    let fut = drive(op, options, emitter, inv.timeout, inv.bus);
    match inv.tracker {
        Some(tracker) => spawn_on(inv.handle.as_ref(), tracker.track_future(fut)),
        None => spawn_on(inv.handle.as_ref(), fut),
    }
    progress
}

fn spawn_on<F>(handle: Option<&Handle>, fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match handle {
        Some(handle) => {
            handle.spawn(fut);
        }
        None => {
            tokio::spawn(fut);
        }
    }
}

/// Runs one invocation to its terminal signal on the current task.
async fn drive<S>(
    op: Arc<S>,
    options: S::Options,
    emitter: Emitter<S::State>,
    timeout: Option<Duration>,
    bus: Option<Bus>,
) where
    S: StreamingOperation + ?Sized,
{
    let bus = bus.as_ref();
    let name: Arc<str> = Arc::from(op.label());
    let id = next_invocation_id();

    if let Err(e) = op.validate(&options) {
        publish_failed(bus, &name, id, 0, &e);
        emitter.fail(e).await;
        return;
    }
    publish_opt(bus, || {
        Event::new(EventKind::OperationStarted)
            .with_source(name.clone())
            .with_invocation(id)
    });

    let token = emitter.token().clone();
    let outcome = {
        let work = with_timeout(op.drive(options, &emitter), timeout, || {
            publish_opt(bus, || {
                Event::new(EventKind::TimeoutHit)
                    .with_source(name.clone())
                    .with_invocation(id)
                    .with_timeout(timeout.unwrap_or_default())
            });
        });
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            res = work => Some(res),
        }
    };

    let snapshots = emitter.emitted();
    match outcome {
        None => {
            publish_opt(bus, || {
                Event::new(EventKind::OperationCancelled)
                    .with_source(name.clone())
                    .with_invocation(id)
                    .with_snapshots(snapshots)
            });
        }
        Some(Ok(())) => {
            publish_opt(bus, || {
                Event::new(EventKind::OperationFinished)
                    .with_source(name.clone())
                    .with_invocation(id)
                    .with_snapshots(snapshots)
            });
            emitter.finish().await;
        }
        Some(Err(e)) => {
            publish_failed(bus, &name, id, snapshots, &e);
            emitter.fail(e).await;
        }
    }
}

/// Drains a streaming operation in place and returns its last snapshot.
///
/// This is the bridge behind `Operation for T: StreamingOperation`.
pub(crate) async fn run_to_last<S>(
    op: &S,
    options: S::Options,
    capacity: usize,
) -> Result<S::State, OperationError>
where
    S: StreamingOperation + ?Sized,
{
    op.validate(&options)?;
    let (emitter, progress) = progress::channel(capacity);
    let producer = async move {
        let res = op.drive(options, &emitter).await;
        emitter.conclude(res).await;
    };
    let ((), last) = tokio::join!(producer, progress.last());
    last
}

/// Awaits a plain operation in place, publishing its lifecycle events.
///
/// Dropping the returned future is how a caller cancels it; no terminal event is
/// published in that case.
pub(crate) async fn run_once<O>(
    op: &O,
    options: O::Options,
    timeout: Option<Duration>,
    bus: Option<&Bus>,
) -> Result<O::Output, OperationError>
where
    O: Operation + ?Sized,
{
    let name: Arc<str> = Arc::from(op.name());
    let id = next_invocation_id();
    publish_opt(bus, || {
        Event::new(EventKind::OperationStarted)
            .with_source(name.clone())
            .with_invocation(id)
    });

    let res = with_timeout(op.run(options), timeout, || {
        publish_opt(bus, || {
            Event::new(EventKind::TimeoutHit)
                .with_source(name.clone())
                .with_invocation(id)
                .with_timeout(timeout.unwrap_or_default())
        });
    })
    .await;

    match &res {
        Ok(_) => publish_opt(bus, || {
            Event::new(EventKind::OperationFinished)
                .with_source(name.clone())
                .with_invocation(id)
        }),
        Err(e) => publish_failed(bus, &name, id, 0, e),
    }
    res
}

/// Races a plain operation against a timer.
///
/// On timeout the operation future is dropped (its work stops at its current await)
/// and [`OperationError::Timeout`] is returned. A zero `timeout` means no limit.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use uniflow::{run_with_timeout, OperationError, OperationFn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let slow = OperationFn::new("slow", |_: ()| async {
///     tokio::time::sleep(Duration::from_secs(60)).await;
///     Ok::<_, OperationError>(())
/// });
/// let res = run_with_timeout(&slow, (), Duration::from_millis(10)).await;
/// assert_eq!(res, Err(OperationError::Timeout { timeout: Duration::from_millis(10) }));
/// # }
/// ```
pub async fn run_with_timeout<O>(
    op: &O,
    options: O::Options,
    timeout: Duration,
) -> Result<O::Output, OperationError>
where
    O: Operation + ?Sized,
{
    with_timeout(op.run(options), Some(timeout), || {}).await
}

/// Applies an optional timeout to `fut`, calling `on_timeout` before reporting it.
async fn with_timeout<F, T>(
    fut: F,
    timeout: Option<Duration>,
    on_timeout: impl FnOnce(),
) -> Result<T, OperationError>
where
    F: Future<Output = Result<T, OperationError>>,
{
    match timeout.filter(|d| *d > Duration::ZERO) {
        Some(dur) => match time::timeout(dur, fut).await {
            Ok(res) => res,
            Err(_elapsed) => {
                on_timeout();
                Err(OperationError::Timeout { timeout: dur })
            }
        },
        None => fut.await,
    }
}

fn publish_failed(bus: Option<&Bus>, name: &Arc<str>, id: u64, snapshots: u64, e: &OperationError) {
    publish_opt(bus, || {
        Event::new(EventKind::OperationFailed)
            .with_source(name.clone())
            .with_invocation(id)
            .with_snapshots(snapshots)
            .with_reason(e.to_string())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::sync::{Notify, oneshot};

    use crate::operations::OperationFn;

    /// Emits two snapshots, waits for `gate`, then tries a third.
    struct Gated {
        gate: Arc<Notify>,
        dropped_tx: std::sync::Mutex<Option<oneshot::Sender<()>>>,
    }

    /// Fires when the drive future is dropped.
    struct DropSignal(Option<oneshot::Sender<()>>);

    impl Drop for DropSignal {
        fn drop(&mut self) {
            if let Some(tx) = self.0.take() {
                let _ = tx.send(());
            }
        }
    }

    #[async_trait]
    impl StreamingOperation for Gated {
        type Options = ();
        type State = u32;

        fn label(&self) -> &str {
            "gated"
        }

        async fn drive(&self, _: (), progress: &Emitter<u32>) -> Result<(), OperationError> {
            let _signal = DropSignal(self.dropped_tx.lock().expect("lock").take());
            progress.emit(1).await;
            progress.emit(2).await;
            self.gate.notified().await;
            progress.emit(3).await;
            Ok(())
        }
    }

    struct Sleeper;

    #[async_trait]
    impl StreamingOperation for Sleeper {
        type Options = Duration;
        type State = &'static str;

        fn label(&self) -> &str {
            "sleeper"
        }

        async fn drive(
            &self,
            nap: Duration,
            progress: &Emitter<&'static str>,
        ) -> Result<(), OperationError> {
            progress.emit("dozing").await;
            time::sleep(nap).await;
            progress.emit("awake").await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancel_stops_producer_within_one_suspension_point() {
        let gate = Arc::new(Notify::new());
        let (dropped_tx, dropped_rx) = oneshot::channel();
        let op = Arc::new(Gated {
            gate: gate.clone(),
            dropped_tx: std::sync::Mutex::new(Some(dropped_tx)),
        });

        let mut progress = spawn(op, (), Invocation::default());
        assert_eq!(progress.next().await, Some(Ok(1)));
        assert_eq!(progress.next().await, Some(Ok(2)));
        progress.cancel();
        gate.notify_one();

        time::timeout(Duration::from_secs(1), dropped_rx)
            .await
            .expect("producer stopped promptly")
            .expect("drop signal");
        assert_eq!(progress.next().await, None);
    }

    #[tokio::test]
    async fn test_events_cover_invocation_lifecycle() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let inv = Invocation {
            bus: Some(bus.clone()),
            ..Invocation::default()
        };

        let progress = spawn(Arc::new(Sleeper), Duration::ZERO, inv);
        assert_eq!(progress.last().await, Ok("awake"));

        let started = rx.recv().await.expect("started");
        assert_eq!(started.kind, EventKind::OperationStarted);
        assert_eq!(started.source.as_deref(), Some("sleeper"));
        let finished = rx.recv().await.expect("finished");
        assert_eq!(finished.kind, EventKind::OperationFinished);
        assert_eq!(finished.snapshots, Some(2));
        assert_eq!(finished.invocation, started.invocation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_stream_after_partial_progress() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let inv = Invocation {
            timeout: Some(Duration::from_secs(1)),
            bus: Some(bus.clone()),
            ..Invocation::default()
        };

        let mut progress = spawn(Arc::new(Sleeper), Duration::from_secs(30), inv);
        assert_eq!(progress.next().await, Some(Ok("dozing")));
        assert_eq!(
            progress.next().await,
            Some(Err(OperationError::Timeout {
                timeout: Duration::from_secs(1)
            }))
        );
        assert_eq!(progress.next().await, None);

        let kinds: Vec<EventKind> = [
            rx.recv().await.expect("ev"),
            rx.recv().await.expect("ev"),
            rx.recv().await.expect("ev"),
        ]
        .iter()
        .map(|e| e.kind)
        .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::OperationStarted,
                EventKind::TimeoutHit,
                EventKind::OperationFailed
            ]
        );
    }

    #[tokio::test]
    async fn test_parent_cancellation_is_not_reported_as_failure() {
        let parent = CancellationToken::new();
        let inv = Invocation {
            parent: Some(parent.clone()),
            ..Invocation::default()
        };
        let mut progress = spawn(Arc::new(Sleeper), Duration::from_secs(30), inv);
        assert_eq!(progress.next().await, Some(Ok("dozing")));

        parent.cancel();
        assert_eq!(progress.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_timeout_passes_fast_result_through() {
        let quick = OperationFn::new("quick", |n: u8| async move { Ok(n + 1) });
        assert_eq!(run_with_timeout(&quick, 1, Duration::from_secs(1)).await, Ok(2));
        assert_eq!(run_with_timeout(&quick, 1, Duration::ZERO).await, Ok(2));
    }
}
