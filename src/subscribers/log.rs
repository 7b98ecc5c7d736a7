//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and examples.
//!
//! ## Output format
//! ```text
//! [session-created] session=room-42
//! [enqueued] session=room-42
//! [dispatched] session=room-42
//! [succeeded] session=room-42
//! [failed] session=room-42 err="connection refused"
//! [cancelled] session=room-42
//! [discarded] session=room-42 count=4
//! [session-drained] session=room-42
//! [shutdown-requested]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use — implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let session = e.session.as_deref().unwrap_or("?");
        match e.kind {
            EventKind::SessionCreated => {
                println!("[session-created] session={session}");
            }
            EventKind::SessionDrained => {
                println!("[session-drained] session={session}");
            }
            EventKind::ItemEnqueued => {
                println!("[enqueued] session={session}");
            }
            EventKind::ItemDispatched => {
                println!("[dispatched] session={session}");
            }
            EventKind::ItemSucceeded => {
                println!("[succeeded] session={session}");
            }
            EventKind::ItemFailed => {
                println!(
                    "[failed] session={session} err={:?}",
                    e.error.as_deref().unwrap_or("")
                );
            }
            EventKind::ItemCancelled => {
                println!("[cancelled] session={session}");
            }
            EventKind::ItemsDiscarded => {
                println!(
                    "[discarded] session={session} count={}",
                    e.count.unwrap_or(0)
                );
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                println!("[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                println!("[grace-exceeded]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
