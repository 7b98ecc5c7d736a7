//! # Work abstractions: items, queues, and the execution seam.
//!
//! This module provides the core work-related types:
//! - [`WorkItem`] — one unit of dispatchable work (session id + payload +
//!   priority flag)
//! - [`WorkQueue`] — per-session double-ended queue with a priority lane
//! - [`Execute`] — trait the surrounding application implements to run items
//! - [`ExecFn`] — closure-backed executor implementation
//! - [`ExecutorRef`] — shared reference to an executor (`Arc<dyn Execute>`)

mod execute;
mod item;
mod queue;

pub use execute::{ExecFn, Execute, ExecutorRef};
pub use item::WorkItem;
pub use queue::WorkQueue;
