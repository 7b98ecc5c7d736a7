//! # Event subscribers for the lanevisor runtime.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! fan-out used to deliver runtime events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Dispatcher/workers ── publish(Event) ──► Bus ──► subscriber listener
//!                                                         │
//!                                                         ▼
//!                                                  SubscriberSet::emit
//!                                              ┌─────────┼─────────┐
//!                                              ▼         ▼         ▼
//!                                          LogWriter  Metrics   Custom
//! ```
//!
//! ## Subscriber types
//! - **Passive subscribers** — observe and react to events (logging,
//!   metrics, alerts)
//! - **Completion hooks** — react to `ItemSucceeded` / `ItemFailed`, which
//!   fire exactly once per terminal item
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use lanevisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::ItemFailed {
//!             // increment failure counter
//!         }
//!     }
//! }
//! ```

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
