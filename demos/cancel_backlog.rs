//! # Demo: cancel_backlog
//!
//! Demonstrates the cancellation contract: queued work is discarded, the
//! one running item finishes normally, and the session drains afterwards.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► queue 5 slow items on one session (ceiling 1)
//!   ├─► wait until the first one is running
//!   ├─► cancel_session("room-1")
//!   │     ├─► 4 queued items discarded
//!   │     └─► the running item is NOT preempted
//!   └─► session drains once the survivor finishes
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example cancel_backlog
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use lanevisor::{Config, DispatcherBuilder, ExecFn, ExecutorRef, WorkError, WorkItem};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    println!("=== cancel_backlog demo ===\n");

    let cfg = Config {
        concurrency_per_session: 1,
        poll_interval: Duration::from_millis(20),
        ..Config::default()
    };

    let started = Arc::new(AtomicUsize::new(0));
    let executor: ExecutorRef<String> = {
        let started = Arc::clone(&started);
        ExecFn::arc(move |item: WorkItem<String>| {
            let started = Arc::clone(&started);
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                println!("[worker] started {:?}", item.payload());
                tokio::time::sleep(Duration::from_millis(500)).await;
                println!("[worker] finished {:?}", item.payload());
                Ok::<_, WorkError>(())
            }
        })
    };

    let dispatcher = DispatcherBuilder::new(cfg).build(executor)?;

    let token = CancellationToken::new();
    let run = {
        let dispatcher = Arc::clone(&dispatcher);
        let token = token.clone();
        tokio::spawn(async move { dispatcher.run(token).await })
    };

    for i in 0..5 {
        dispatcher.produce(WorkItem::new("room-1", format!("task {i}")));
    }

    // Wait for the first item to begin.
    while started.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    println!("[main] cancelling room-1 (4 queued items should be discarded)");
    dispatcher.cancel_session("room-1");

    // The survivor finishes and the slot is swept away.
    while dispatcher.has_session("room-1") {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    println!("[main] session drained; items executed: {}", started.load(Ordering::SeqCst));
    assert_eq!(started.load(Ordering::SeqCst), 1);

    token.cancel();
    run.await??;

    println!("\n=== demo completed ===");
    Ok(())
}
