//! # Demo: chat_sessions
//!
//! Simulates a chat front end dispatching messages for two rooms through
//! one dispatcher.
//!
//! Shows how to:
//! - Build a [`Dispatcher`] with the built-in [`LogWriter`] subscriber
//! - Produce normal messages and a `#`-prefixed control command
//! - Watch the priority lane and the per-session ceiling in the log output
//!
//! ## Run
//! ```bash
//! cargo run --example chat_sessions --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use lanevisor::{Config, DispatcherBuilder, ExecFn, ExecutorRef, LogWriter, Subscribe, WorkError, WorkItem};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    println!("=== chat_sessions demo ===\n");

    // 1. Configure: tight ceiling so the backlog is visible.
    let cfg = Config {
        concurrency_per_session: 2,
        poll_interval: Duration::from_millis(20),
        ..Config::default()
    };

    // 2. The executor stands in for reply generation: slow on purpose.
    let executor: ExecutorRef<String> = ExecFn::arc(|item: WorkItem<String>| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        println!("    -> replied to {}: {:?}", item.session(), item.payload());
        Ok::<_, WorkError>(())
    });

    // 3. Build with the stdout logger.
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let dispatcher = DispatcherBuilder::new(cfg)
        .with_subscribers(subs)
        .build(executor)?;

    // 4. Run in the background.
    let token = CancellationToken::new();
    let run = {
        let dispatcher = Arc::clone(&dispatcher);
        let token = token.clone();
        tokio::spawn(async move { dispatcher.run(token).await })
    };

    // 5. Two rooms talk at once; a control command jumps room-1's backlog.
    for i in 0..5 {
        dispatcher.produce(WorkItem::new("room-1", format!("message {i}")));
        dispatcher.produce(WorkItem::new("room-2", format!("message {i}")));
    }
    dispatcher.produce(WorkItem::new("room-1", "#reset".to_string()).with_command_sigil('#'));

    // 6. Let everything drain, then shut down.
    tokio::time::sleep(Duration::from_secs(2)).await;
    println!("\nlive sessions before shutdown: {:?}", dispatcher.sessions());

    token.cancel();
    run.await??;

    println!("\n=== demo completed ===");
    Ok(())
}
