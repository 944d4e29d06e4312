//! # Runtime: composition root for invocations, stores, and monitors.
//!
//! The [`Runtime`] owns the event bus, the monitor listener, a root cancellation token,
//! and the executor handle. Everything it creates is wired to the bus and to the root
//! token, so one `shutdown` stops every in-flight invocation.
//!
//! ## High-level architecture
//! ```text
//! Runtime::stream(op, options)
//!   └─► child token = root.child_token()
//!       tracker.spawn(runner::drive(...))  ── publish ──┐
//!                                                       │
//! Runtime::store / presenter                            │
//!   └─► Store writer (confined to the runtime handle) ──┤
//!                                                       ▼
//!                                               Bus (broadcast)
//!                                                       │
//!                                          monitor_listener (builder)
//!                                                       ▼
//!                                     MonitorSet ──► worker per monitor
//!
//! Shutdown path:
//!   shutdown()
//!     └─► Bus.publish(ShutdownRequested)
//!     └─► root.cancel()                 → every invocation stops (no terminal error)
//!     └─► tracker.wait() within grace   → Err(GraceExceeded) on timeout
//!     └─► stop monitor listener, drain queued events
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use uniflow::{Emitter, OperationError, Runtime, RuntimeConfig, StreamingOperation};
//!
//! struct Count;
//!
//! #[async_trait]
//! impl StreamingOperation for Count {
//!     type Options = u32;
//!     type State = u32;
//!
//!     async fn drive(&self, to: u32, progress: &Emitter<u32>) -> Result<(), OperationError> {
//!         for n in 1..=to {
//!             progress.emit(n).await;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rt = Runtime::builder(RuntimeConfig::default()).build()?;
//! assert_eq!(rt.stream(Arc::new(Count), 3).last().await, Ok(3));
//! rt.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::builder::RuntimeBuilder;
use super::config::RuntimeConfig;
use super::runner::{self, Invocation};
use crate::broadcast::{Confinement, Store};
use crate::error::{BuildError, OperationError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::operations::{Operation, StreamingOperation};
use crate::presentation::{PresentationState, Presenter, Projection};
use crate::progress::Progress;

/// Owns the shared infrastructure of one application.
pub struct Runtime {
    cfg: RuntimeConfig,
    bus: Bus,
    handle: Handle,
    root: CancellationToken,
    tracker: TaskTracker,
    listener: Mutex<Option<JoinHandle<()>>>,
    stop_monitors: CancellationToken,
}

impl Runtime {
    /// Creates a builder for a runtime with the given configuration.
    pub fn builder(cfg: RuntimeConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: RuntimeConfig,
        bus: Bus,
        handle: Handle,
        root: CancellationToken,
        tracker: TaskTracker,
        listener: Mutex<Option<JoinHandle<()>>>,
        stop_monitors: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            handle,
            root,
            tracker,
            listener,
            stop_monitors,
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.cfg
    }

    /// Starts a streaming invocation with the configured capacity and default timeout.
    pub fn stream<S>(&self, op: Arc<S>, options: S::Options) -> Progress<S::State>
    where
        S: StreamingOperation + ?Sized,
    {
        runner::spawn(op, options, self.invocation(self.cfg.default_timeout()))
    }

    /// Like [`stream`](Self::stream) with an explicit timeout (`Duration::ZERO` = none).
    pub fn stream_with_timeout<S>(
        &self,
        op: Arc<S>,
        options: S::Options,
        timeout: Duration,
    ) -> Progress<S::State>
    where
        S: StreamingOperation + ?Sized,
    {
        runner::spawn(op, options, self.invocation(Some(timeout)))
    }

    /// Awaits a plain operation under the default timeout, publishing lifecycle events.
    ///
    /// The call runs on the caller's task; dropping the future cancels it.
    pub async fn run<O>(&self, op: &O, options: O::Options) -> Result<O::Output, OperationError>
    where
        O: Operation + ?Sized,
    {
        runner::run_once(op, options, self.cfg.default_timeout(), Some(&self.bus)).await
    }

    /// Creates a store confined to this runtime and wired to its event bus.
    pub fn store<T>(&self, name: impl Into<Arc<str>>, initial: T) -> Result<Store<T>, BuildError>
    where
        T: Clone + Send + 'static,
    {
        let config = self.cfg.store_config(Confinement::On(self.handle.clone()));
        Store::spawn(name.into(), initial, config, Some(self.bus.clone()))
    }

    /// Creates a presenter whose invocations are tied to this runtime.
    pub fn presenter<P: Projection>(
        &self,
        name: impl Into<Arc<str>>,
    ) -> Result<Presenter<P>, BuildError> {
        let store = self.store(name, PresentationState::Uninitialized)?;
        Ok(Presenter::with_store(
            store,
            self.invocation(self.cfg.default_timeout()),
        ))
    }

    /// True once [`shutdown`](Self::shutdown) was called.
    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Number of invocations still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Cancels every in-flight invocation, waits for them within `grace`, and drains monitors.
    ///
    /// Cancelled streams end without an error. Invocations started after shutdown are
    /// cancelled immediately. Calling `shutdown` twice is harmless.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        if !self.root.is_cancelled() {
            self.bus.publish(Event::new(EventKind::ShutdownRequested));
            tracing::info!(in_flight = self.tracker.len(), "runtime shutdown requested");
        }
        self.root.cancel();
        self.tracker.close();

        let grace = self.cfg.grace;
        let drained = tokio::time::timeout(grace, self.tracker.wait()).await;
        self.stop_monitors.cancel();

        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            if tokio::time::timeout(grace, listener).await.is_err() {
                tracing::warn!(?grace, "monitors did not drain within grace");
            }
        }

        match drained {
            Ok(()) => Ok(()),
            Err(_) => Err(RuntimeError::GraceExceeded {
                grace,
                in_flight: self.tracker.len(),
            }),
        }
    }

    fn invocation(&self, timeout: Option<Duration>) -> Invocation {
        Invocation {
            capacity: self.cfg.progress_capacity_clamped(),
            timeout,
            parent: Some(self.root.clone()),
            bus: Some(self.bus.clone()),
            handle: Some(self.handle.clone()),
            tracker: Some(self.tracker.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::monitors::Monitor;
    use crate::operations::OperationFn;
    use crate::presentation::{Identity, Outcome};
    use crate::progress::Emitter;
    use async_trait::async_trait;
    use futures::StreamExt;

    #[derive(Default)]
    struct Recorder {
        kinds: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Monitor for Recorder {
        async fn on_event(&self, event: &Event) {
            self.kinds.lock().expect("lock").push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    impl Recorder {
        fn kinds(&self) -> Vec<EventKind> {
            self.kinds.lock().expect("lock").clone()
        }
    }

    struct Forever;

    #[async_trait]
    impl StreamingOperation for Forever {
        type Options = ();
        type State = u32;

        fn label(&self) -> &str {
            "forever"
        }

        async fn drive(&self, _: (), progress: &Emitter<u32>) -> Result<(), OperationError> {
            progress.emit(1).await;
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn runtime(recorder: &Arc<Recorder>) -> Arc<Runtime> {
        Runtime::builder(RuntimeConfig::default())
            .with_monitors(vec![recorder.clone() as Arc<dyn Monitor>])
            .build()
            .expect("runtime")
    }

    #[test]
    fn test_build_outside_tokio_fails() {
        let res = Runtime::builder(RuntimeConfig::default()).build();
        assert_eq!(res.err(), Some(BuildError::NoRuntime));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_streams_without_error() {
        let recorder = Arc::new(Recorder::default());
        let rt = runtime(&recorder);

        let mut progress = rt.stream(Arc::new(Forever), ());
        assert_eq!(progress.next().await, Some(Ok(1)));
        assert_eq!(rt.in_flight(), 1);

        rt.shutdown().await.expect("drained within grace");
        assert_eq!(progress.next().await, None);
        assert_eq!(rt.in_flight(), 0);

        let kinds = recorder.kinds();
        assert!(kinds.contains(&EventKind::OperationStarted));
        assert!(kinds.contains(&EventKind::ShutdownRequested));
        assert!(kinds.contains(&EventKind::OperationCancelled));
        assert!(!kinds.contains(&EventKind::OperationFailed));
    }

    #[tokio::test]
    async fn test_run_publishes_failure() {
        let recorder = Arc::new(Recorder::default());
        let rt = runtime(&recorder);
        let op = OperationFn::new("explode", |_: ()| async {
            Err::<(), _>(OperationError::fail("boom"))
        });

        assert_eq!(rt.run(&op, ()).await, Err(OperationError::fail("boom")));
        rt.shutdown().await.expect("shutdown");
        assert_eq!(
            recorder.kinds(),
            vec![
                EventKind::OperationStarted,
                EventKind::OperationFailed,
                EventKind::ShutdownRequested
            ]
        );
    }

    #[tokio::test]
    async fn test_shutdown_cancels_presenter_invocation() {
        let recorder = Arc::new(Recorder::default());
        let rt = runtime(&recorder);
        let presenter: Presenter<Identity<u32>> = rt.presenter("screen").expect("presenter");
        let mut sub = presenter.observe();
        assert_eq!(sub.next().await, Some(PresentationState::Uninitialized));

        let background = presenter.clone();
        let run = tokio::spawn(async move { background.perform(Arc::new(Forever), ()).await });
        assert_eq!(sub.next().await, Some(PresentationState::Loading { prior: None }));
        assert_eq!(
            sub.next().await,
            Some(PresentationState::Operating {
                live: 1,
                prior: None
            })
        );

        rt.shutdown().await.expect("shutdown");
        assert_eq!(run.await.expect("join"), Outcome::Cancelled);
        assert_eq!(presenter.state().await, Some(PresentationState::Uninitialized));
        assert!(recorder.kinds().contains(&EventKind::SubscriptionOpened));
    }

    /// Blocks its worker thread after the first snapshot, so cancellation cannot land.
    struct Stubborn;

    #[async_trait]
    impl StreamingOperation for Stubborn {
        type Options = Duration;
        type State = u32;

        async fn drive(
            &self,
            hold: Duration,
            progress: &Emitter<u32>,
        ) -> Result<(), OperationError> {
            progress.emit(1).await;
            std::thread::sleep(hold);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_reports_invocations_outliving_grace() {
        let grace = Duration::from_millis(50);
        let rt = Runtime::builder(RuntimeConfig {
            grace,
            ..RuntimeConfig::default()
        })
        .build()
        .expect("runtime");

        let mut progress = rt.stream(Arc::new(Stubborn), Duration::from_millis(500));
        assert_eq!(progress.next().await, Some(Ok(1)));

        let err = rt.shutdown().await.expect_err("grace exceeded");
        assert_eq!(
            err,
            RuntimeError::GraceExceeded {
                grace,
                in_flight: 1
            }
        );
        assert_eq!(err.as_label(), "runtime_grace_exceeded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_with_timeout_overrides_default() {
        let recorder = Arc::new(Recorder::default());
        let rt = runtime(&recorder);
        let timeout = Duration::from_secs(2);

        let mut progress = rt.stream_with_timeout(Arc::new(Forever), (), timeout);
        assert_eq!(progress.next().await, Some(Ok(1)));
        assert_eq!(
            progress.next().await,
            Some(Err(OperationError::Timeout { timeout }))
        );
        assert_eq!(progress.next().await, None);

        rt.shutdown().await.expect("shutdown");
        let kinds = recorder.kinds();
        assert!(kinds.contains(&EventKind::TimeoutHit));
        assert!(kinds.contains(&EventKind::OperationFailed));
    }
}
