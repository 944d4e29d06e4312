//! # Runtime configuration.
//!
//! Provides [`RuntimeConfig`]: centralized settings for a [`Runtime`](crate::Runtime).
//!
//! Config is used in two ways:
//! 1. **Runtime creation**: `Runtime::builder(config).build()`
//! 2. **Per-invocation defaults**: channel capacity and timeout of every `Runtime::stream`/`run`
//!
//! ## Sentinel values
//! - `timeout = 0s` → no timeout
//! - capacities of `0` are clamped to `1`
//!
//! The runtime never loads configuration itself; callers build it from whatever
//! source they use and pass it in fully resolved.

use std::time::Duration;

use crate::broadcast::{Confinement, DEFAULT_SUBSCRIBER_CAPACITY, StoreConfig};
use crate::progress::DEFAULT_CAPACITY;

/// Global configuration for the runtime.
///
/// ## Field semantics
/// - `progress_capacity`: snapshots buffered per invocation before `emit` waits for the consumer
/// - `subscriber_capacity`: values buffered per store subscription before the oldest are skipped
///   (rounded up to a power of two by the underlying broadcast ring)
/// - `bus_capacity`: event bus ring buffer size
/// - `timeout`: default per-invocation timeout (`0s` = none)
/// - `grace`: how long `shutdown` waits for invocations and monitors to drain
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Per-invocation progress channel buffer.
    pub progress_capacity: usize,

    /// Per-subscription ring buffer of stores created by the runtime.
    pub subscriber_capacity: usize,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Monitors lagging behind more than `bus_capacity` events skip the oldest ones.
    pub bus_capacity: usize,

    /// Default invocation timeout.
    ///
    /// - `Duration::ZERO` = no timeout
    /// - `> 0` = the invocation fails with `OperationError::Timeout`
    pub timeout: Duration,

    /// Maximum wait for in-flight invocations and monitor queues during shutdown.
    pub grace: Duration,
}

impl RuntimeConfig {
    /// Returns the default invocation timeout as an `Option`.
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a progress capacity clamped to a minimum of 1.
    #[inline]
    pub fn progress_capacity_clamped(&self) -> usize {
        self.progress_capacity.max(1)
    }

    /// Store settings for a store confined to `confinement`.
    pub fn store_config(&self, confinement: Confinement) -> StoreConfig {
        StoreConfig {
            subscriber_capacity: self.subscriber_capacity.max(1),
            confinement,
        }
    }
}

impl Default for RuntimeConfig {
    /// Default configuration:
    ///
    /// - `progress_capacity = 32`
    /// - `subscriber_capacity = 64`
    /// - `bus_capacity = 1024`
    /// - `timeout = 0s` (no timeout)
    /// - `grace = 5s`
    fn default() -> Self {
        Self {
            progress_capacity: DEFAULT_CAPACITY,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            bus_capacity: 1024,
            timeout: Duration::ZERO,
            grace: Duration::from_secs(5),
        }
    }
}
