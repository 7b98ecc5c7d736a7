//! # Execution handle: one dispatched item's observable state.
//!
//! [`ExecHandle`] is the cancellable, awaitable-by-polling reference to one
//! dispatched work item. It is a lock-free state machine on an `AtomicU8`:
//!
//! ```text
//! Pending ──try_start──► Running ──finish──► Succeeded | Failed
//!    │
//!    └──try_cancel──► Cancelled
//! ```
//!
//! ## Rules
//! - `try_cancel` succeeds **only** while `Pending`: a running item is never
//!   preempted and always reaches `Succeeded` or `Failed`.
//! - `try_start` is the worker-side gate: when it loses the race to
//!   `try_cancel`, the item is discarded without executing.
//! - Terminal states (`Succeeded`, `Failed`, `Cancelled`) never change.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Observable state of one dispatched work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecState {
    /// Submitted to the pool, not yet picked up by a worker.
    Pending,
    /// A worker is executing the item.
    Running,
    /// Execution finished successfully.
    Succeeded,
    /// Execution failed (error or caught panic).
    Failed,
    /// Cancelled before execution began.
    Cancelled,
}

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const SUCCEEDED: u8 = 2;
const FAILED: u8 = 3;
const CANCELLED: u8 = 4;

/// Cancellable reference to one dispatched item's eventual outcome.
///
/// Shared between the session slot's in-flight set (for pruning and
/// cancellation) and the job travelling to the worker pool (for the
/// start/finish transitions).
#[derive(Debug)]
pub(crate) struct ExecHandle {
    state: AtomicU8,
}

impl ExecHandle {
    /// Creates a new handle in the `Pending` state.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(PENDING),
        })
    }

    /// Returns the current state.
    pub fn state(&self) -> ExecState {
        match self.state.load(Ordering::Acquire) {
            PENDING => ExecState::Pending,
            RUNNING => ExecState::Running,
            SUCCEEDED => ExecState::Succeeded,
            FAILED => ExecState::Failed,
            _ => ExecState::Cancelled,
        }
    }

    /// Requests cancellation; succeeds only while the item has not started.
    ///
    /// Returns `true` if this call transitioned `Pending → Cancelled`.
    /// A handle already running (or terminal) is unaffected.
    pub fn try_cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Worker-side gate: transitions `Pending → Running`.
    ///
    /// Returns `false` when cancellation won the race; the caller must then
    /// discard the item without executing it.
    pub fn try_start(&self) -> bool {
        self.state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Stores the terminal outcome of a running item.
    pub fn finish(&self, ok: bool) {
        let terminal = if ok { SUCCEEDED } else { FAILED };
        self.state.store(terminal, Ordering::Release);
    }

    /// True once the handle reached `Succeeded`, `Failed`, or `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state(),
            ExecState::Succeeded | ExecState::Failed | ExecState::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_only_while_pending() {
        let h = ExecHandle::new();
        assert_eq!(h.state(), ExecState::Pending);
        assert!(h.try_cancel());
        assert_eq!(h.state(), ExecState::Cancelled);
        // Terminal; a second cancel is a no-op.
        assert!(!h.try_cancel());
    }

    #[test]
    fn test_running_item_is_not_cancellable() {
        let h = ExecHandle::new();
        assert!(h.try_start());
        assert!(!h.try_cancel());
        assert_eq!(h.state(), ExecState::Running);

        h.finish(true);
        assert_eq!(h.state(), ExecState::Succeeded);
        assert!(h.is_terminal());
    }

    #[test]
    fn test_start_loses_to_cancel() {
        let h = ExecHandle::new();
        assert!(h.try_cancel());
        assert!(!h.try_start());
        assert_eq!(h.state(), ExecState::Cancelled);
    }

    #[test]
    fn test_failed_outcome() {
        let h = ExecHandle::new();
        assert!(h.try_start());
        h.finish(false);
        assert_eq!(h.state(), ExecState::Failed);
        assert!(h.is_terminal());
    }
}
