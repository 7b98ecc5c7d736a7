//! # lanevisor
//!
//! **Lanevisor** is a session-lane dispatch library for Rust.
//!
//! It accepts units of work tagged by a session id, caps how many items of
//! one session run at once, preserves per-session ordering (with a priority
//! lane for control commands), executes on a shared worker pool, and can
//! cancel work that has not started yet. The crate is designed as the
//! concurrency core of message-driven front ends (chat bots, webhook
//! handlers) where each conversation must be throttled independently.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!    produce(WorkItem)          produce(WorkItem)        cancel_session(id)
//!          │                          │                        │
//!          ▼                          ▼                        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  SessionTable (one mutex; create-on-first-use, delete-on-drain)   │
//! │   session "a" ─► SessionSlot { WorkQueue, permits(N), in_flight } │
//! │   session "b" ─► SessionSlot { WorkQueue, permits(N), in_flight } │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                │ Dispatcher loop (every poll_interval):
//!                                │   try_acquire permit → pop item →
//!                                ▼   submit Job{item, handle, permit}
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  WorkerPool (fixed size, shared across sessions)                  │
//! │    worker 1 … worker M: handle.try_start() → execute(item)        │
//! │    terminal state stored, then the job-owned permit drops         │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                │ publishes Events
//!                                ▼
//!              Bus (broadcast) ──► subscriber listener ──► SubscriberSet
//!                                                  ┌─────────┼─────────┐
//!                                                  ▼         ▼         ▼
//!                                              LogWriter  metrics   custom
//! ```
//!
//! ### Item lifecycle
//! ```text
//! produce() ──► Queued ──► Dispatched ──► Running ──► Succeeded | Failed
//!                 │             │
//!                 │             └── cancel (before a worker starts it)
//!                 │                        └──► Cancelled
//!                 └── cancel (still queued) ──► discarded (ItemsDiscarded)
//! ```
//!
//! ## Guarantees
//! | Property            | Description                                                          |
//! |---------------------|----------------------------------------------------------------------|
//! | **Session ceiling** | At most `concurrency_per_session` items of one session run at once.  |
//! | **Ordering**        | Per-session FIFO; priority items jump the backlog, FIFO among themselves. |
//! | **Cancellation**    | Only not-started work is cancelled; running work always completes.   |
//! | **Permit safety**   | Exactly one permit release per dispatched item, on every path.       |
//! | **Isolation**       | Executor errors and panics never take down the loop or a worker.     |
//! | **Drain**           | Idle sessions are deleted atomically (no race with `produce`).       |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use lanevisor::{Config, DispatcherBuilder, ExecFn, ExecutorRef, WorkError, WorkItem};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // The executor is where the surrounding application lives: reply
//!     // generation, outbound sends, anything slow.
//!     let executor: ExecutorRef<String> = ExecFn::arc(|item: WorkItem<String>| async move {
//!         println!("handling {} for {}", item.payload(), item.session());
//!         Ok::<_, WorkError>(())
//!     });
//!
//!     let dispatcher = DispatcherBuilder::new(Config::default()).build(executor)?;
//!
//!     let token = CancellationToken::new();
//!     let run = {
//!         let dispatcher = Arc::clone(&dispatcher);
//!         let token = token.clone();
//!         tokio::spawn(async move { dispatcher.run(token).await })
//!     };
//!
//!     // Normal message; control command takes the priority lane.
//!     dispatcher.produce(WorkItem::new("room-42", "hello there".to_string()));
//!     dispatcher.produce(WorkItem::new("room-42", "#reset".to_string()).with_command_sigil('#'));
//!
//!     token.cancel();
//!     run.await??;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod subscribers;
mod work;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{Dispatcher, DispatcherBuilder};
pub use error::{RuntimeError, WorkError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};
pub use work::{ExecFn, Execute, ExecutorRef, WorkItem, WorkQueue};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
