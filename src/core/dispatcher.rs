//! # Dispatcher: session-scoped dispatch loop, cancellation, and shutdown.
//!
//! The [`Dispatcher`] owns the session table, the event bus, a
//! [`SubscriberSet`], and the collaborator's executor. A single polling loop
//! scans the table, claims per-session permits, and hands work to the shared
//! [`WorkerPool`]; drained sessions are deleted in the same critical section
//! that proves they are drained.
//!
//! ## Key responsibilities
//! - accept inbound items via [`Dispatcher::produce`] (O(1), never blocks
//!   beyond the table lock)
//! - enforce the per-session concurrency ceiling with permit try-acquires
//! - preserve FIFO order per session, with a priority lane for control
//!   commands
//! - discard not-started work on [`Dispatcher::cancel_session`] /
//!   [`Dispatcher::cancel_all_sessions`]
//! - perform graceful shutdown with a configurable [`Config::grace`]
//!
//! ## High-level architecture
//! ```text
//! produce(item) ──► SessionTable.get_or_create(session) ──► WorkQueue
//!                                                             (head if priority)
//!
//! run(token): every poll_interval, under the table lock:
//!   for each session:
//!     try_acquire permit
//!       ├─ ok + item   ─► pop, submit Job{item, handle, permit} to pool,
//!       │                 record handle in in_flight
//!       ├─ ok + empty  ─► release; atomic drain check ─► delete slot
//!       └─ exhausted   ─► skip (session at its ceiling)
//!
//! Worker completion ─► terminal event ─► permit released (job-owned RAII)
//!
//! Shutdown path:
//!   token.cancel()
//!     └─► publish ShutdownRequested
//!     └─► workers finish their current item, then exit
//!     └─► wait up to grace:
//!           ├─ all joined    → AllStoppedWithin
//!           └─ grace elapsed → GraceExceeded + busy session list
//! ```
//!
//! ## Why polling
//! The set of live sessions is unbounded and dynamic; one lightweight
//! scanning loop avoids dedicating a blocked consumer to every idle
//! session. The scan never stalls on a busy session because the permit
//! acquire is non-blocking.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use lanevisor::{Config, DispatcherBuilder, ExecFn, ExecutorRef, WorkError, WorkItem};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor: ExecutorRef<String> = ExecFn::arc(|item: WorkItem<String>| async move {
//!         println!("{}: {}", item.session(), item.payload());
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
//!     dispatcher.produce(WorkItem::new("room-42", "hello".to_string()));
//!     dispatcher.produce(WorkItem::new("room-42", "#reset".to_string()).with_command_sigil('#'));
//!
//!     token.cancel();
//!     run.await??;
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::handle::ExecHandle;
use crate::core::pool::{Job, WorkerPool};
use crate::core::shutdown;
use crate::core::table::SessionTable;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::work::{ExecutorRef, WorkItem};

/// Builder for constructing a [`Dispatcher`].
///
/// Validates the configuration at [`DispatcherBuilder::build`] — an invalid
/// ceiling or pool size is rejected here, never at dispatch time.
pub struct DispatcherBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl DispatcherBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (item lifecycle, cancellations,
    /// shutdown) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the dispatcher and wires up the subscriber fan-out.
    ///
    /// Must be called from within a Tokio runtime. Returns
    /// [`RuntimeError::InvalidConfig`] for out-of-range configuration.
    pub fn build<T: Send + 'static>(
        self,
        executor: ExecutorRef<T>,
    ) -> Result<Arc<Dispatcher<T>>, RuntimeError> {
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers));

        let dispatcher = Arc::new(Dispatcher {
            table: Mutex::new(SessionTable::new(self.cfg.concurrency_per_session)),
            cfg: self.cfg,
            bus,
            subs,
            executor,
        });
        dispatcher.subscriber_listener();
        Ok(dispatcher)
    }
}

/// Session-scoped concurrent dispatcher.
///
/// Accepts work items tagged by session id, enforces a per-session
/// concurrency ceiling, preserves ordering with a priority lane, executes on
/// a shared worker pool, and supports cancellation of not-yet-started work.
pub struct Dispatcher<T> {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    table: Mutex<SessionTable<T>>,
    executor: ExecutorRef<T>,
}

impl<T> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cfg", &self.cfg)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Accepts one work item. Infallible; never blocks beyond the brief
    /// table-lock hold.
    ///
    /// A new session gets a slot with the configured concurrency ceiling;
    /// priority items enter the head lane of their session queue.
    pub fn produce(&self, item: WorkItem<T>) {
        let mut table = self.table_guard();
        table.produce(item, &self.bus);
    }

    /// Cancels all not-yet-started work for one session.
    ///
    /// Dispatched-but-pending items are cancelled via their handles; the
    /// queued backlog is discarded and counted. Running work is unaffected
    /// and its permit is still released on completion. Returns once the
    /// discard is done; the slot itself is deleted later by the drain check.
    pub fn cancel_session(&self, session: &str) {
        let mut table = self.table_guard();
        table.cancel_session(session, &self.bus);
    }

    /// Applies [`Dispatcher::cancel_session`] to every live session.
    pub fn cancel_all_sessions(&self) {
        let mut table = self.table_guard();
        table.cancel_all(&self.bus);
    }

    /// True if the session currently has a slot (queued or running work,
    /// or not yet swept by the drain check).
    pub fn has_session(&self, session: &str) -> bool {
        self.table_guard().contains(session)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.table_guard().len()
    }

    /// Sorted snapshot of live session ids.
    pub fn sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .table_guard()
            .session_ids()
            .iter()
            .map(|id| id.to_string())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Shared event bus.
    ///
    /// Useful for subscribing to the raw event stream when the
    /// [`SubscriberSet`] fan-out is more machinery than needed.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs the dispatch loop until `token` is cancelled, then shuts down
    /// gracefully.
    ///
    /// Spawns the worker pool, scans the session table every
    /// [`Config::poll_interval`], and on cancellation waits up to
    /// [`Config::grace`] for running work to finish. Call at most once per
    /// dispatcher.
    pub async fn run(&self, token: CancellationToken) -> Result<(), RuntimeError> {
        let pool = WorkerPool::spawn(
            self.cfg.worker_pool_size,
            Arc::clone(&self.executor),
            self.bus.clone(),
            token.child_token(),
        );

        loop {
            if token.is_cancelled() {
                break;
            }
            self.tick(&pool);
            tokio::select! {
                _ = token.cancelled() => break,
                _ = time::sleep(self.cfg.poll_interval) => {}
            }
        }

        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.drive_shutdown(pool).await
    }

    /// Convenience wrapper: runs until the process receives a termination
    /// signal (SIGINT/SIGTERM/SIGQUIT, or Ctrl-C on Windows).
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        let token = CancellationToken::new();
        let signal_token = token.clone();
        tokio::spawn(async move {
            let _ = shutdown::wait_for_shutdown_signal().await;
            signal_token.cancel();
        });
        self.run(token).await
    }

    /// One scan of the session table, entirely under the table lock.
    ///
    /// Claims at most one permit per session per tick. The lock is never
    /// held across an await: queue operations, permit try-acquires, and
    /// pool submission are all non-blocking.
    fn tick(&self, pool: &WorkerPool<T>) {
        let mut table = self.table_guard();
        for session in table.session_ids() {
            let Some(slot) = table.get_mut(&session) else {
                continue;
            };
            slot.prune_in_flight();

            let Ok(permit) = Arc::clone(&slot.permits).try_acquire_owned() else {
                // Session is at its concurrency ceiling this tick.
                continue;
            };

            if let Some(item) = slot.queue.pop_front() {
                let handle = ExecHandle::new();
                slot.in_flight.push(Arc::clone(&handle));
                self.bus.publish(
                    Event::new(EventKind::ItemDispatched).with_session(Arc::clone(&session)),
                );
                pool.submit(Job {
                    item,
                    handle,
                    permit,
                });
            } else {
                drop(permit);
                // Empty queue: the slot may be fully drained. The check is
                // atomic with deletion because produce() also needs this
                // lock and the probe claims every permit.
                if slot.try_drain() {
                    table.remove(&session);
                    self.bus
                        .publish(Event::new(EventKind::SessionDrained).with_session(session));
                }
            }
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set
    /// (fire-and-forget).
    fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Waits for the pool to stop within the configured grace period.
    async fn drive_shutdown(&self, pool: WorkerPool<T>) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        match time::timeout(grace, pool.join()).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus.publish(Event::new(EventKind::GraceExceeded));
                let stuck = self.table_guard().busy_sessions();
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Table lock accessor; recovers from poisoning (the critical sections
    /// hold no user code, so a poisoned table is still structurally sound).
    fn table_guard(&self) -> MutexGuard<'_, SessionTable<T>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use tokio::task::JoinHandle;

    use crate::error::WorkError;
    use crate::work::ExecFn;

    fn test_config() -> Config {
        Config {
            poll_interval: Duration::from_millis(10),
            grace: Duration::from_secs(5),
            ..Config::default()
        }
    }

    /// Event-kind recorder subscriber for assertions.
    struct Recorder {
        kinds: StdMutex<Vec<EventKind>>,
    }

    impl Recorder {
        fn arc() -> Arc<Self> {
            Arc::new(Self {
                kinds: StdMutex::new(Vec::new()),
            })
        }

        fn count(&self, kind: EventKind) -> usize {
            self.kinds.lock().unwrap().iter().filter(|k| **k == kind).count()
        }
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.kinds.lock().unwrap().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    fn start(
        dispatcher: &Arc<Dispatcher<String>>,
    ) -> (CancellationToken, JoinHandle<Result<(), RuntimeError>>) {
        let token = CancellationToken::new();
        let run = {
            let dispatcher = Arc::clone(dispatcher);
            let token = token.clone();
            tokio::spawn(async move { dispatcher.run(token).await })
        };
        (token, run)
    }

    async fn wait_until(deadline: Duration, cond: impl Fn() -> bool) -> bool {
        let end = Instant::now() + deadline;
        while Instant::now() < end {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cond()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_per_session_concurrency_cap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let executor: crate::work::ExecutorRef<String> = {
            let (active, peak, done) = (active.clone(), peak.clone(), done.clone());
            ExecFn::arc(move |_item: WorkItem<String>| {
                let (active, peak, done) = (active.clone(), peak.clone(), done.clone());
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(40)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, WorkError>(())
                }
            })
        };

        let cfg = Config {
            concurrency_per_session: 2,
            ..test_config()
        };
        let dispatcher = DispatcherBuilder::new(cfg).build(executor).unwrap();
        let (token, run) = start(&dispatcher);

        for i in 0..10 {
            dispatcher.produce(WorkItem::new("s", format!("m{i}")));
        }

        assert!(
            wait_until(Duration::from_secs(10), || done.load(Ordering::SeqCst) == 10).await,
            "all items should complete"
        );
        assert!(
            peak.load(Ordering::SeqCst) <= 2,
            "peak {} exceeded the session ceiling",
            peak.load(Ordering::SeqCst)
        );

        token.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fifo_with_priority_lane() {
        let order = Arc::new(StdMutex::new(Vec::<String>::new()));
        let executor: crate::work::ExecutorRef<String> = {
            let order = order.clone();
            ExecFn::arc(move |item: WorkItem<String>| {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(item.into_payload());
                    Ok::<_, WorkError>(())
                }
            })
        };

        let cfg = Config {
            concurrency_per_session: 1,
            ..test_config()
        };
        let dispatcher = DispatcherBuilder::new(cfg).build(executor).unwrap();

        // Enqueue everything before the loop starts so the dequeue order is
        // exactly the queue order.
        dispatcher.produce(WorkItem::new("s", "a".to_string()));
        dispatcher.produce(WorkItem::new("s", "b".to_string()));
        dispatcher.produce(WorkItem::new("s", "c".to_string()));
        dispatcher.produce(WorkItem::new("s", "#p".to_string()).with_command_sigil('#'));

        let (token, run) = start(&dispatcher);
        assert!(
            wait_until(Duration::from_secs(5), || order.lock().unwrap().len() == 4).await
        );
        assert_eq!(*order.lock().unwrap(), vec!["#p", "a", "b", "c"]);

        token.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_drain_deletes_idle_session() {
        let executor: crate::work::ExecutorRef<String> = ExecFn::arc(|_item: WorkItem<String>| async move { Ok::<_, WorkError>(()) });
        let dispatcher = DispatcherBuilder::new(test_config()).build(executor).unwrap();
        let (token, run) = start(&dispatcher);

        dispatcher.produce(WorkItem::new("s", "only".to_string()));
        assert!(
            wait_until(Duration::from_secs(2), || !dispatcher.has_session("s")).await,
            "drained session should be deleted within a few poll intervals"
        );
        assert_eq!(dispatcher.session_count(), 0);

        token.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_session_spares_running_item() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let executor: crate::work::ExecutorRef<String> = {
            let (started, finished) = (started.clone(), finished.clone());
            ExecFn::arc(move |_item: WorkItem<String>| {
                let (started, finished) = (started.clone(), finished.clone());
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, WorkError>(())
                }
            })
        };

        let cfg = Config {
            concurrency_per_session: 1,
            ..test_config()
        };
        let dispatcher = DispatcherBuilder::new(cfg).build(executor).unwrap();
        let (token, run) = start(&dispatcher);

        for i in 0..5 {
            dispatcher.produce(WorkItem::new("s", format!("m{i}")));
        }
        assert!(
            wait_until(Duration::from_secs(2), || started.load(Ordering::SeqCst) == 1).await
        );

        dispatcher.cancel_session("s");

        // The in-flight item completes normally and its permit release lets
        // the session drain; the other four never execute.
        assert!(
            wait_until(Duration::from_secs(3), || !dispatcher.has_session("s")).await,
            "session should drain after the running item finishes"
        );
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        token.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_reaches_dispatched_but_not_started_item() {
        let executed = Arc::new(AtomicUsize::new(0));
        let executor: crate::work::ExecutorRef<String> = {
            let executed = executed.clone();
            ExecFn::arc(move |_item: WorkItem<String>| {
                let executed = executed.clone();
                async move {
                    executed.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    Ok::<_, WorkError>(())
                }
            })
        };

        let recorder = Recorder::arc();
        let cfg = Config {
            concurrency_per_session: 2,
            worker_pool_size: 1,
            ..test_config()
        };
        let dispatcher = DispatcherBuilder::new(cfg)
            .with_subscribers(vec![recorder.clone() as Arc<dyn Subscribe>])
            .build(executor)
            .unwrap();
        let (token, run) = start(&dispatcher);

        // With one pool worker and a ceiling of two, the second item is
        // dispatched (permit claimed) but waits behind the first in the
        // pool; it is cancellable right up until a worker picks it up.
        dispatcher.produce(WorkItem::new("s", "first".to_string()));
        dispatcher.produce(WorkItem::new("s", "second".to_string()));
        assert!(
            wait_until(Duration::from_secs(2), || {
                recorder.count(EventKind::ItemDispatched) == 2
            })
            .await
        );

        dispatcher.cancel_session("s");

        assert!(
            wait_until(Duration::from_secs(3), || !dispatcher.has_session("s")).await,
            "session should drain; the cancelled job's permit must come back"
        );
        assert_eq!(executed.load(Ordering::SeqCst), 1);
        assert!(
            wait_until(Duration::from_secs(1), || {
                recorder.count(EventKind::ItemCancelled) == 1
            })
            .await,
            "the undispatched job should surface as cancelled"
        );

        token.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sessions_do_not_interfere() {
        let peak_a = Arc::new(AtomicUsize::new(0));
        let peak_b = Arc::new(AtomicUsize::new(0));
        let active_a = Arc::new(AtomicUsize::new(0));
        let active_b = Arc::new(AtomicUsize::new(0));
        let global_peak = Arc::new(AtomicUsize::new(0));
        let global_active = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let executor: crate::work::ExecutorRef<String> = {
            let (peak_a, peak_b) = (peak_a.clone(), peak_b.clone());
            let (active_a, active_b) = (active_a.clone(), active_b.clone());
            let (global_peak, global_active, done) =
                (global_peak.clone(), global_active.clone(), done.clone());
            ExecFn::arc(move |item: WorkItem<String>| {
                let (active, peak) = if item.session() == "a" {
                    (active_a.clone(), peak_a.clone())
                } else {
                    (active_b.clone(), peak_b.clone())
                };
                let (global_peak, global_active, done) =
                    (global_peak.clone(), global_active.clone(), done.clone());
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    let g = global_active.fetch_add(1, Ordering::SeqCst) + 1;
                    global_peak.fetch_max(g, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    global_active.fetch_sub(1, Ordering::SeqCst);
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, WorkError>(())
                }
            })
        };

        let cfg = Config {
            concurrency_per_session: 1,
            ..test_config()
        };
        let dispatcher = DispatcherBuilder::new(cfg).build(executor).unwrap();
        let (token, run) = start(&dispatcher);

        for i in 0..3 {
            dispatcher.produce(WorkItem::new("a", format!("a{i}")));
            dispatcher.produce(WorkItem::new("b", format!("b{i}")));
        }

        assert!(
            wait_until(Duration::from_secs(5), || done.load(Ordering::SeqCst) == 6).await
        );
        assert!(peak_a.load(Ordering::SeqCst) <= 1);
        assert!(peak_b.load(Ordering::SeqCst) <= 1);
        assert!(
            global_peak.load(Ordering::SeqCst) >= 2,
            "one session's backlog must not serialize the other session"
        );

        token.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_permits_survive_completion_and_cancellation_cycles() {
        let done = Arc::new(AtomicUsize::new(0));
        let executor: crate::work::ExecutorRef<String> = {
            let done = done.clone();
            ExecFn::arc(move |_item: WorkItem<String>| {
                let done = done.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, WorkError>(())
                }
            })
        };

        let cfg = Config {
            concurrency_per_session: 2,
            ..test_config()
        };
        let dispatcher = DispatcherBuilder::new(cfg).build(executor).unwrap();
        let (token, run) = start(&dispatcher);

        // Cycle 1: normal completion.
        for i in 0..4 {
            dispatcher.produce(WorkItem::new("s", format!("m{i}")));
        }
        assert!(
            wait_until(Duration::from_secs(3), || !dispatcher.has_session("s")).await
        );
        assert_eq!(done.load(Ordering::SeqCst), 4);

        // Cycle 2: cancel a backlog mid-way, then reuse the session. If any
        // permit leaked, the reused session could never reach its ceiling
        // again and the final batch would stall.
        for i in 0..6 {
            dispatcher.produce(WorkItem::new("s", format!("n{i}")));
        }
        dispatcher.cancel_session("s");
        assert!(
            wait_until(Duration::from_secs(3), || !dispatcher.has_session("s")).await
        );

        let before = done.load(Ordering::SeqCst);
        for i in 0..4 {
            dispatcher.produce(WorkItem::new("s", format!("r{i}")));
        }
        assert!(
            wait_until(Duration::from_secs(3), || {
                done.load(Ordering::SeqCst) == before + 4
            })
            .await,
            "a reused session must still have its full permit capacity"
        );

        token.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_and_panics_do_not_stop_dispatch() {
        let executor: crate::work::ExecutorRef<String> = ExecFn::arc(|item: WorkItem<String>| async move {
            match item.payload().as_str() {
                "fail" => Err(WorkError::fail("boom")),
                "panic" => panic!("executor exploded"),
                _ => Ok(()),
            }
        });

        let recorder = Recorder::arc();
        let dispatcher = DispatcherBuilder::new(test_config())
            .with_subscribers(vec![recorder.clone() as Arc<dyn Subscribe>])
            .build(executor)
            .unwrap();
        let (token, run) = start(&dispatcher);

        dispatcher.produce(WorkItem::new("s", "fail".to_string()));
        dispatcher.produce(WorkItem::new("s", "panic".to_string()));
        dispatcher.produce(WorkItem::new("s", "ok".to_string()));

        assert!(
            wait_until(Duration::from_secs(3), || !dispatcher.has_session("s")).await,
            "failing items must still release their permits"
        );
        assert!(
            wait_until(Duration::from_secs(1), || {
                recorder.count(EventKind::ItemFailed) == 2
                    && recorder.count(EventKind::ItemSucceeded) == 1
            })
            .await
        );

        // The loop is still alive after a panic inside execute.
        dispatcher.produce(WorkItem::new("s2", "ok".to_string()));
        assert!(
            wait_until(Duration::from_secs(2), || {
                recorder.count(EventKind::ItemSucceeded) == 2
            })
            .await
        );

        token.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_all_sessions_sweeps_every_backlog() {
        let executed = Arc::new(AtomicUsize::new(0));
        let executor: crate::work::ExecutorRef<String> = {
            let executed = executed.clone();
            ExecFn::arc(move |_item: WorkItem<String>| {
                let executed = executed.clone();
                async move {
                    executed.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<_, WorkError>(())
                }
            })
        };

        let cfg = Config {
            concurrency_per_session: 1,
            ..test_config()
        };
        let dispatcher = DispatcherBuilder::new(cfg).build(executor).unwrap();
        let (token, run) = start(&dispatcher);

        for i in 0..4 {
            dispatcher.produce(WorkItem::new("a", format!("a{i}")));
            dispatcher.produce(WorkItem::new("b", format!("b{i}")));
        }
        assert!(
            wait_until(Duration::from_secs(2), || executed.load(Ordering::SeqCst) >= 2).await
        );

        dispatcher.cancel_all_sessions();
        assert!(
            wait_until(Duration::from_secs(3), || dispatcher.session_count() == 0).await
        );
        // At most the two in-flight items (one per session) ran to
        // completion; the rest of both backlogs was discarded.
        assert!(executed.load(Ordering::SeqCst) <= 4);

        token.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_invalid_config_rejected_at_build() {
        let executor: crate::work::ExecutorRef<String> = ExecFn::arc(|_item: WorkItem<String>| async move { Ok::<_, WorkError>(()) });
        let cfg = Config {
            concurrency_per_session: 0,
            ..Config::default()
        };
        let err = DispatcherBuilder::new(cfg).build(executor).unwrap_err();
        assert_eq!(err.as_label(), "runtime_invalid_config");
    }
}
