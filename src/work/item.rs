//! # Work item: one unit of dispatchable work.
//!
//! A [`WorkItem`] tags an opaque payload with the session it belongs to and
//! a priority flag. Items are immutable once enqueued; the dispatcher only
//! moves them, it never inspects the payload.
//!
//! Control commands (e.g. chat messages starting with `#`) are flagged as
//! priority so they jump the session's backlog; see
//! [`WorkItem::with_command_sigil`].

use std::sync::Arc;

/// One unit of dispatchable work, tagged with a session id and priority flag.
///
/// The payload type `T` is opaque to the dispatcher: it is carried from
/// [`produce`](crate::Dispatcher::produce) to the collaborator's
/// [`Execute::execute`](crate::Execute::execute) untouched.
///
/// ## Example
/// ```rust
/// use lanevisor::WorkItem;
///
/// let normal = WorkItem::new("room-42", "hello".to_string());
/// assert!(!normal.is_priority());
///
/// let command = WorkItem::new("room-42", "#reset".to_string()).with_command_sigil('#');
/// assert!(command.is_priority());
/// assert_eq!(command.session(), "room-42");
/// ```
#[derive(Debug)]
pub struct WorkItem<T> {
    session: Arc<str>,
    payload: T,
    priority: bool,
}

impl<T> WorkItem<T> {
    /// Creates a normal (non-priority) item for the given session.
    pub fn new(session: impl Into<Arc<str>>, payload: T) -> Self {
        Self {
            session: session.into(),
            payload,
            priority: false,
        }
    }

    /// Creates a priority item for the given session.
    ///
    /// Priority items are enqueued at the head of the session queue and
    /// dequeue ahead of any previously-enqueued normal item.
    pub fn priority(session: impl Into<Arc<str>>, payload: T) -> Self {
        Self {
            session: session.into(),
            payload,
            priority: true,
        }
    }

    /// Returns the session id this item belongs to.
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Returns a shared handle to the session id.
    pub(crate) fn session_arc(&self) -> Arc<str> {
        Arc::clone(&self.session)
    }

    /// Returns a reference to the payload.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Consumes the item, returning the payload.
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// True if this item takes the priority lane.
    pub fn is_priority(&self) -> bool {
        self.priority
    }
}

impl<T: AsRef<str>> WorkItem<T> {
    /// Flags the item as priority when its payload starts with `sigil`.
    ///
    /// This is how control commands are detected in chat-shaped payloads:
    /// a message beginning with the command sigil is an admin command and
    /// should jump the session's backlog.
    pub fn with_command_sigil(mut self, sigil: char) -> Self {
        if self.payload.as_ref().starts_with(sigil) {
            self.priority = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_sigil_flags_priority() {
        let item = WorkItem::new("s", "#clear".to_string()).with_command_sigil('#');
        assert!(item.is_priority());

        let plain = WorkItem::new("s", "hello #tag".to_string()).with_command_sigil('#');
        assert!(!plain.is_priority());
    }

    #[test]
    fn test_payload_round_trip() {
        let item = WorkItem::new("s", vec![1u8, 2, 3]);
        assert_eq!(item.payload(), &vec![1u8, 2, 3]);
        assert_eq!(item.into_payload(), vec![1u8, 2, 3]);
    }
}
