//! # Runtime events emitted by the dispatcher and worker pool.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Session events**: slot lifecycle (created, drained-and-deleted)
//! - **Item events**: work-item flow (enqueued, dispatched, terminal states)
//! - **Cancellation events**: queued work discarded by the controller
//! - **Shutdown events**: graceful termination progress
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! the session id, error text, and discard counts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use lanevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ItemFailed)
//!     .with_session("room-42")
//!     .with_error("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::ItemFailed);
//! assert_eq!(ev.session.as_deref(), Some("room-42"));
//! assert_eq!(ev.error.as_deref(), Some("connection refused"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Session lifecycle ===
    /// A session slot was created on first produce.
    ///
    /// Sets:
    /// - `session`: session id
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    SessionCreated,

    /// A fully drained session slot was deleted from the table.
    ///
    /// Emitted only after the atomic drain check: queue empty, no
    /// in-flight work, every permit free.
    ///
    /// Sets:
    /// - `session`: session id
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    SessionDrained,

    // === Item flow ===
    /// An item was accepted into a session queue.
    ///
    /// Sets:
    /// - `session`: session id
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ItemEnqueued,

    /// An item was handed to the worker pool (permit claimed).
    ///
    /// Sets:
    /// - `session`: session id
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ItemDispatched,

    /// An item finished successfully.
    ///
    /// Sets:
    /// - `session`: session id
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ItemSucceeded,

    /// An item's execution failed (error or caught panic).
    ///
    /// Sets:
    /// - `session`: session id
    /// - `error`: failure message
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ItemFailed,

    /// A dispatched item was cancelled before it began running.
    ///
    /// Never emitted for running work; a running item always reaches
    /// `ItemSucceeded` or `ItemFailed`.
    ///
    /// Sets:
    /// - `session`: session id
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ItemCancelled,

    // === Cancellation ===
    /// Queued (never dispatched) items were discarded by a cancel call.
    ///
    /// Sets:
    /// - `session`: session id
    /// - `count`: number of discarded items
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ItemsDiscarded,

    // === Shutdown ===
    /// Shutdown requested (run token cancelled).
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ShutdownRequested,

    /// All workers stopped within the configured grace period.
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    AllStoppedWithin,

    /// Grace period exceeded; some sessions still had running work.
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Session id, if applicable.
    pub session: Option<Arc<str>>,
    /// Human-readable error text (failures, panics).
    pub error: Option<Arc<str>>,
    /// Item count (discarded items).
    pub count: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            session: None,
            error: None,
            count: None,
        }
    }

    /// Attaches a session id.
    #[inline]
    pub fn with_session(mut self, session: impl Into<Arc<str>>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Attaches a human-readable error text.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches an item count.
    #[inline]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }
}
