//! # Global runtime configuration.
//!
//! Provides [`Config`] — centralized settings for the dispatch runtime.
//!
//! Config is consumed once by
//! [`DispatcherBuilder::build`](crate::DispatcherBuilder::build), which
//! rejects invalid values up front: a concurrency ceiling or pool size below
//! 1 is a configuration error, not something to discover at dispatch time.

use std::time::Duration;

use crate::error::RuntimeError;

/// Global configuration for the dispatch runtime.
///
/// Defines:
/// - **Session concurrency**: how many items of one session may run at once
/// - **Global concurrency**: the size of the shared worker pool
/// - **Scan cadence**: how often the dispatcher polls the session table
/// - **Event system**: bus capacity for event delivery
/// - **Shutdown behavior**: grace period for graceful termination
///
/// ## Field semantics
/// - `concurrency_per_session`: permit capacity of each session slot (min 1)
/// - `worker_pool_size`: number of shared worker tasks (min 1)
/// - `poll_interval`: sleep between dispatcher scans
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `grace`: maximum wait for running work to finish during shutdown
///   (`0s` = don't wait, report busy sessions immediately)
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of items of a single session executing at once.
    ///
    /// Each session slot is created with a semaphore of this capacity. An
    /// item is dispatched only after a permit is claimed, so a session can
    /// never occupy more than this many pool workers.
    pub concurrency_per_session: usize,

    /// Number of worker tasks in the shared execution pool.
    ///
    /// The pool bounds *global* concurrency across all sessions; the
    /// per-session semaphore bounds *session* concurrency.
    pub worker_pool_size: usize,

    /// Interval between dispatcher scans of the session table.
    ///
    /// Each tick claims at most one permit per session, so the interval also
    /// bounds how quickly a backlogged session ramps up to its ceiling.
    pub poll_interval: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages
    /// will receive `Lagged` and skip older items. Minimum value is 1
    /// (enforced by Bus).
    pub bus_capacity: usize,

    /// Maximum time to wait for running work during graceful shutdown.
    ///
    /// When the run token is cancelled, workers finish their current item
    /// and exit; the dispatcher waits up to `grace` for them before
    /// returning `RuntimeError::GraceExceeded`.
    pub grace: Duration,
}

impl Config {
    /// Validates the configuration, rejecting values the runtime cannot run with.
    ///
    /// Returns [`RuntimeError::InvalidConfig`] naming the first offending
    /// field. Called by `DispatcherBuilder::build`; startup is the only
    /// place configuration errors surface.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.concurrency_per_session < 1 {
            return Err(RuntimeError::InvalidConfig {
                field: "concurrency_per_session",
            });
        }
        if self.worker_pool_size < 1 {
            return Err(RuntimeError::InvalidConfig {
                field: "worker_pool_size",
            });
        }
        if self.poll_interval == Duration::ZERO {
            return Err(RuntimeError::InvalidConfig {
                field: "poll_interval",
            });
        }
        Ok(())
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    ///
    /// The `Bus` uses this value to avoid constructing an invalid channel.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `concurrency_per_session = 4`
    /// - `worker_pool_size = 8`
    /// - `poll_interval = 100ms`
    /// - `bus_capacity = 1024`
    /// - `grace = 30s`
    fn default() -> Self {
        Self {
            concurrency_per_session: 4,
            worker_pool_size: 8,
            poll_interval: Duration::from_millis(100),
            bus_capacity: 1024,
            grace: Duration::from_secs(30),
        }
    }
}
