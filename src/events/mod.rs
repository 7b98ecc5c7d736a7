//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the dispatcher loop, the
//! session table, and the worker pool.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] — event classification and payload metadata
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Dispatcher` (tick/shutdown), `SessionTable`
//!   (enqueue/discard), pool workers (terminal item states).
//! - **Consumer**: the dispatcher's subscriber listener, which fans out to
//!   the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
