use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::{config::RuntimeConfig, runtime::Runtime};
use crate::error::BuildError;
use crate::events::{Bus, Event};
use crate::monitors::{Monitor, MonitorSet};

/// Builder for constructing a [`Runtime`] with optional monitors.
pub struct RuntimeBuilder {
    cfg: RuntimeConfig,
    monitors: Vec<Arc<dyn Monitor>>,
    handle: Option<Handle>,
}

impl RuntimeBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: RuntimeConfig) -> Self {
        Self {
            cfg,
            monitors: Vec::new(),
            handle: None,
        }
    }

    /// Sets event monitors for observability.
    ///
    /// Monitors receive runtime events (invocation lifecycle, subscriptions, etc.)
    /// through dedicated workers with bounded queues.
    pub fn with_monitors(mut self, monitors: Vec<Arc<dyn Monitor>>) -> Self {
        self.monitors = monitors;
        self
    }

    /// Confines invocations, stores, and monitor workers to an explicit tokio runtime.
    ///
    /// Defaults to the runtime `build` is called on.
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Builds the runtime and starts the monitor listener.
    ///
    /// Fails with [`BuildError::NoRuntime`] when no handle was given and `build`
    /// runs outside a tokio runtime.
    pub fn build(self) -> Result<Arc<Runtime>, BuildError> {
        let handle = match self.handle {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| BuildError::NoRuntime)?,
        };
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let monitors = MonitorSet::new(self.monitors, bus.clone(), &handle);
        let stop = CancellationToken::new();
        let listener = handle.spawn(monitor_listener(bus.subscribe(), monitors, stop.clone()));

        Ok(Arc::new(Runtime::new_internal(
            self.cfg,
            bus,
            handle,
            CancellationToken::new(),
            TaskTracker::new(),
            Mutex::new(Some(listener)),
            stop,
        )))
    }
}

/// Forwards bus events to the monitor set until `stop` fires, then drains and closes it.
async fn monitor_listener(
    mut rx: broadcast::Receiver<Event>,
    monitors: MonitorSet,
    stop: CancellationToken,
) {
    if monitors.is_empty() {
        drop(rx);
        stop.cancelled().await;
        return;
    }

    loop {
        tokio::select! {
            biased;
            res = rx.recv() => match res {
                Ok(ev) => monitors.dispatch(Arc::new(ev)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "monitor listener lagging behind the event bus");
                }
                Err(RecvError::Closed) => break,
            },
            _ = stop.cancelled() => break,
        }
    }

    loop {
        match rx.try_recv() {
            Ok(ev) => monitors.dispatch(Arc::new(ev)),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    monitors.shutdown().await;
}
