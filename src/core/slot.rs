//! # Session slot: per-session concurrency state.
//!
//! A [`SessionSlot`] bundles everything the dispatcher tracks for one
//! session: the work queue, the bounded permit semaphore, and the set of
//! outstanding execution handles.
//!
//! ## Invariants
//! - `permits.available_permits() + checked_out == capacity` at all times;
//!   permits are only checked out by the dispatcher and only released by the
//!   job's owned permit dropping after a terminal state is stored.
//! - `in_flight` holds exactly the handles submitted but not yet observed
//!   terminal; the dispatcher prunes it each tick.
//! - A slot may be deleted only via [`SessionSlot::try_drain`], which makes
//!   the emptiness check atomic with permit accounting.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::core::handle::ExecHandle;
use crate::work::WorkQueue;

/// Per-session concurrency state: queue, permits, in-flight handles.
pub(crate) struct SessionSlot<T> {
    /// Queued, not-yet-dispatched items.
    pub queue: WorkQueue<T>,
    /// Bounded permit pool; capacity = the session concurrency ceiling.
    pub permits: Arc<Semaphore>,
    /// Permit capacity the slot was created with.
    pub capacity: usize,
    /// Handles of dispatched items not yet observed terminal.
    pub in_flight: Vec<Arc<ExecHandle>>,
}

impl<T> SessionSlot<T> {
    /// Creates a slot with the given concurrency ceiling.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: WorkQueue::new(),
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Vec::new(),
        }
    }

    /// Drops handles that reached a terminal state.
    pub fn prune_in_flight(&mut self) {
        self.in_flight.retain(|h| !h.is_terminal());
    }

    /// True if any dispatched item has not yet reached a terminal state.
    pub fn has_live_work(&self) -> bool {
        self.in_flight.iter().any(|h| !h.is_terminal())
    }

    /// Atomic drain check: returns `true` when the slot is fully drained
    /// and may be deleted.
    ///
    /// Must be called with the table lock held (so no `produce` can
    /// interleave). Briefly claims **all** permits: success proves that no
    /// permit is checked out anywhere, which together with an empty queue
    /// and an empty in-flight set means the session is done. This makes the
    /// emptiness decision atomic with permit accounting instead of
    /// inferring it from a lone available-permit count.
    pub fn try_drain(&mut self) -> bool {
        self.prune_in_flight();
        if !self.queue.is_empty() || !self.in_flight.is_empty() {
            return false;
        }
        match self.permits.try_acquire_many(self.capacity as u32) {
            Ok(all) => {
                // Holding every permit: nothing can be running. A non-empty
                // in-flight set here is a concurrency bug, not a user error.
                debug_assert!(self.in_flight.is_empty());
                debug_assert!(self.queue.is_empty());
                drop(all);
                true
            }
            Err(_) => false,
        }
    }

    /// Requests cancellation of every not-yet-started dispatched item and
    /// discards the queued backlog; returns the number of discarded items.
    ///
    /// Running items are untouched: their handles refuse the cancel and the
    /// work runs to completion, releasing its permit normally. The queue is
    /// replaced wholesale rather than cleared in place.
    pub fn cancel(&mut self) -> usize {
        for handle in &self.in_flight {
            handle.try_cancel();
        }
        let discarded = self.queue.take();
        discarded.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::WorkItem;

    #[test]
    fn test_new_slot_is_drainable() {
        let mut slot: SessionSlot<String> = SessionSlot::new(4);
        assert!(slot.try_drain());
        // Drain check releases its probe permits.
        assert_eq!(slot.permits.available_permits(), 4);
    }

    #[test]
    fn test_queued_item_blocks_drain() {
        let mut slot: SessionSlot<String> = SessionSlot::new(2);
        slot.queue.push(WorkItem::new("s", "x".to_string()));
        assert!(!slot.try_drain());
    }

    #[test]
    fn test_checked_out_permit_blocks_drain() {
        let mut slot: SessionSlot<String> = SessionSlot::new(2);
        let permit = Arc::clone(&slot.permits).try_acquire_owned().unwrap();
        assert!(!slot.try_drain());
        drop(permit);
        assert!(slot.try_drain());
    }

    #[test]
    fn test_pending_handle_blocks_drain_until_terminal() {
        let mut slot: SessionSlot<String> = SessionSlot::new(2);
        let handle = ExecHandle::new();
        slot.in_flight.push(Arc::clone(&handle));
        assert!(!slot.try_drain());

        assert!(handle.try_start());
        handle.finish(true);
        assert!(slot.try_drain());
        assert!(slot.in_flight.is_empty());
    }

    #[test]
    fn test_cancel_discards_queue_and_pending_handles() {
        let mut slot: SessionSlot<String> = SessionSlot::new(2);
        slot.queue.push(WorkItem::new("s", "a".to_string()));
        slot.queue.push(WorkItem::new("s", "b".to_string()));

        let pending = ExecHandle::new();
        let running = ExecHandle::new();
        assert!(running.try_start());
        slot.in_flight.push(Arc::clone(&pending));
        slot.in_flight.push(Arc::clone(&running));

        let discarded = slot.cancel();
        assert_eq!(discarded, 2);
        assert!(slot.queue.is_empty());
        assert!(pending.is_terminal());
        // The running item is a hard no-cancel contract.
        assert!(!running.is_terminal());
    }
}
