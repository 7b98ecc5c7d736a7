//! # Worker pool: fixed-size shared execution lane.
//!
//! The pool bounds *global* concurrency: a fixed number of worker tasks
//! pull [`Job`]s from a shared channel and run them through the
//! collaborator's [`Execute`] implementation. Session-level concurrency is
//! already bounded by the permit each job carries.
//!
//! ## Job flow
//! ```text
//! submit(Job) ──► channel ──► worker: handle.try_start()
//!                               ├─ false ─► publish ItemCancelled, drop job
//!                               └─ true  ─► execute(item)
//!                                     ├─ Ok(())    ─► finish(ok),  ItemSucceeded
//!                                     ├─ Err(e)    ─► finish(err), ItemFailed
//!                                     └─ panic     ─► finish(err), ItemFailed
//!                               (permit dropped last, after the terminal
//!                                state is stored)
//! ```
//!
//! ## Rules
//! - Exactly one permit release per submitted job, on every path: the job
//!   owns its `OwnedSemaphorePermit`, so release is tied to the job's drop,
//!   not to control flow.
//! - The permit is dropped only **after** the handle stores a terminal
//!   state; an observer that sees every permit free can rely on every
//!   handle being terminal.
//! - Nothing a work item does (error or panic) can take a worker down.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, OwnedSemaphorePermit, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::handle::ExecHandle;
use crate::error::WorkError;
use crate::events::{Bus, Event, EventKind};
use crate::work::{Execute, ExecutorRef, WorkItem};

/// One dispatched item travelling to the pool.
///
/// Carries the session permit it was dispatched under; the permit is
/// released when the job is consumed (or dropped), never earlier.
pub(crate) struct Job<T> {
    pub item: WorkItem<T>,
    pub handle: Arc<ExecHandle>,
    pub permit: OwnedSemaphorePermit,
}

/// Fixed-size pool of worker tasks fed by an unbounded channel.
pub(crate) struct WorkerPool<T> {
    tx: mpsc::UnboundedSender<Job<T>>,
    workers: Vec<JoinHandle<()>>,
    token: CancellationToken,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawns `size` workers executing through `executor`.
    ///
    /// Workers stop when `token` is cancelled (after finishing their
    /// current job) or when the submission side is dropped.
    pub fn spawn(size: usize, executor: ExecutorRef<T>, bus: Bus, token: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Job<T>>();
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..size)
            .map(|_| {
                let rx = Arc::clone(&rx);
                let executor = Arc::clone(&executor);
                let bus = bus.clone();
                let token = token.clone();
                tokio::spawn(worker_loop(rx, executor, bus, token))
            })
            .collect();

        Self { tx, workers, token }
    }

    /// Hands a job to the pool. Never blocks.
    ///
    /// If the workers are already gone (shutdown), the job is dropped here:
    /// its permit releases via RAII and its handle stays pending, which is
    /// fine because nothing scans the table after shutdown.
    pub fn submit(&self, job: Job<T>) {
        let _ = self.tx.send(job);
    }

    /// Signals the workers to stop and waits for them to finish their
    /// current job. The caller wraps this in its grace timeout.
    pub async fn join(self) {
        self.token.cancel();
        drop(self.tx);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// One worker: pull a job, run it, repeat.
async fn worker_loop<T: Send + 'static>(
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Job<T>>>>,
    executor: ExecutorRef<T>,
    bus: Bus,
    token: CancellationToken,
) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = token.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            }
        };
        run_job(job, executor.as_ref(), &bus).await;
    }
}

/// Runs one job to a terminal state and releases its permit exactly once.
async fn run_job<T>(job: Job<T>, executor: &dyn Execute<T>, bus: &Bus)
where
    T: Send + 'static,
{
    let Job {
        item,
        handle,
        permit,
    } = job;
    let session = item.session_arc();

    if !handle.try_start() {
        // Cancelled while waiting for a worker; discard without executing.
        bus.publish(Event::new(EventKind::ItemCancelled).with_session(session));
        drop(permit);
        return;
    }

    let outcome = std::panic::AssertUnwindSafe(executor.execute(item))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => {
            handle.finish(true);
            bus.publish(Event::new(EventKind::ItemSucceeded).with_session(session));
        }
        Ok(Err(err)) => {
            handle.finish(false);
            bus.publish(
                Event::new(EventKind::ItemFailed)
                    .with_session(session)
                    .with_error(err.to_string()),
            );
        }
        Err(panic) => {
            handle.finish(false);
            let err = WorkError::Panicked {
                panic: panic_text(panic.as_ref()),
            };
            bus.publish(
                Event::new(EventKind::ItemFailed)
                    .with_session(session)
                    .with_error(err.to_string()),
            );
        }
    }

    // Terminal state is stored; only now may the permit go back.
    drop(permit);
}

/// Renders a caught panic payload as text.
fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
