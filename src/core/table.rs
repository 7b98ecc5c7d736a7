//! # Session table: id → slot mapping with create-on-first-use.
//!
//! [`SessionTable`] owns every [`SessionSlot`]. The dispatcher wraps it in
//! one process-wide mutex; every structural decision (slot creation,
//! deletion, cancellation sweep) happens inside that critical section, and
//! nothing in here blocks or awaits.
//!
//! ## Rules
//! - Slots are created lazily by [`SessionTable::produce`] and removed only
//!   by the dispatcher's drain check.
//! - Cancellation never removes a slot; it only discards not-started work.
//! - All operations are O(1) in the number of queued items (the
//!   cancellation sweep is O(in-flight), which is bounded by the ceiling).

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::slot::SessionSlot;
use crate::events::{Bus, Event, EventKind};
use crate::work::WorkItem;

/// Mapping from session id to its slot. Unique keys, no ordering guarantee.
pub(crate) struct SessionTable<T> {
    slots: HashMap<Arc<str>, SessionSlot<T>>,
    /// Permit capacity for newly created slots.
    concurrency: usize,
}

impl<T> SessionTable<T> {
    /// Creates an empty table; new slots get `concurrency` permits.
    pub fn new(concurrency: usize) -> Self {
        Self {
            slots: HashMap::new(),
            concurrency,
        }
    }

    /// Accepts one item: creates the slot on first use, then routes the
    /// item into the queue (head lane if priority, tail otherwise).
    pub fn produce(&mut self, item: WorkItem<T>, bus: &Bus) {
        let session = item.session_arc();
        let concurrency = self.concurrency;
        let slot = self.slots.entry(Arc::clone(&session)).or_insert_with(|| {
            bus.publish(Event::new(EventKind::SessionCreated).with_session(Arc::clone(&session)));
            SessionSlot::new(concurrency)
        });
        slot.queue.push(item);
        bus.publish(Event::new(EventKind::ItemEnqueued).with_session(session));
    }

    /// Cancels all not-yet-started work for one session.
    ///
    /// Publishes `ItemsDiscarded` with the backlog count when anything was
    /// queued. Unknown session ids are a no-op. The slot itself stays until
    /// the dispatcher's drain check removes it.
    pub fn cancel_session(&mut self, session: &str, bus: &Bus) {
        if let Some(slot) = self.slots.get_mut(session) {
            let discarded = slot.cancel();
            if discarded > 0 {
                bus.publish(
                    Event::new(EventKind::ItemsDiscarded)
                        .with_session(session)
                        .with_count(discarded as u32),
                );
            }
        }
    }

    /// Applies the cancellation procedure to every session in the table.
    pub fn cancel_all(&mut self, bus: &Bus) {
        for (id, slot) in self.slots.iter_mut() {
            let discarded = slot.cancel();
            if discarded > 0 {
                bus.publish(
                    Event::new(EventKind::ItemsDiscarded)
                        .with_session(Arc::clone(id))
                        .with_count(discarded as u32),
                );
            }
        }
    }

    /// Snapshot of the current session ids.
    pub fn session_ids(&self) -> Vec<Arc<str>> {
        self.slots.keys().cloned().collect()
    }

    /// Borrows a slot mutably.
    pub fn get_mut(&mut self, session: &str) -> Option<&mut SessionSlot<T>> {
        self.slots.get_mut(session)
    }

    /// Removes a slot (drain path only).
    pub fn remove(&mut self, session: &str) -> Option<SessionSlot<T>> {
        self.slots.remove(session)
    }

    /// True if the session currently has a slot.
    pub fn contains(&self, session: &str) -> bool {
        self.slots.contains_key(session)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Session ids that still have non-terminal dispatched work.
    ///
    /// Used by graceful shutdown to name the sessions that exceeded the
    /// grace period.
    pub fn busy_sessions(&self) -> Vec<String> {
        let mut busy: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.has_live_work())
            .map(|(id, _)| id.to_string())
            .collect();
        busy.sort_unstable();
        busy
    }
}
