//! Error types used by the lanevisor runtime and work execution.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — errors raised by the dispatch runtime itself.
//! - [`WorkError`] — errors raised by individual work-item executions.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for
//! logging/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the lanevisor runtime.
///
/// These represent failures in the dispatch system itself: invalid
/// configuration rejected at startup, or a shutdown sequence exceeding its
/// grace period. A failing work item is never a runtime error (see
/// [`WorkError`]).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A configuration field failed validation at build time.
    #[error("invalid configuration: {field} must be at least 1")]
    InvalidConfig {
        /// Name of the offending configuration field.
        field: &'static str,
    },

    /// Shutdown grace period was exceeded; some sessions still had running work.
    #[error("shutdown grace {grace:?} exceeded; busy sessions: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Session ids that still had non-terminal work when the grace expired.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use lanevisor::RuntimeError;
    ///
    /// let err = RuntimeError::InvalidConfig { field: "worker_pool_size" };
    /// assert_eq!(err.as_label(), "runtime_invalid_config");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidConfig { .. } => "runtime_invalid_config",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::InvalidConfig { field } => {
                format!("invalid config field: {field}")
            }
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; busy sessions={stuck:?}")
            }
        }
    }
}

/// # Errors produced by work-item execution.
///
/// These represent failures of the collaborator-supplied
/// [`Execute`](crate::Execute) function. They are recovered locally by the
/// worker pool (published as an `ItemFailed` event) and never retried by the
/// core; cancellation is a separate terminal state, not an error.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkError {
    /// Execution returned an error.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Execution panicked; the panic was caught by the worker pool.
    #[error("execution panicked: {panic}")]
    Panicked {
        /// The panic payload rendered as text.
        panic: String,
    },
}

impl WorkError {
    /// Wraps an arbitrary error as a [`WorkError::Fail`].
    pub fn fail(error: impl std::fmt::Display) -> Self {
        WorkError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use lanevisor::WorkError;
    ///
    /// let err = WorkError::fail("boom");
    /// assert_eq!(err.as_label(), "work_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkError::Fail { .. } => "work_failed",
            WorkError::Panicked { .. } => "work_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            WorkError::Fail { error } => format!("error: {error}"),
            WorkError::Panicked { panic } => format!("panic: {panic}"),
        }
    }
}
