//! # Execution seam and function-backed executor.
//!
//! This module defines the [`Execute`] trait — the boundary through which
//! the surrounding application runs one work item — and a convenient
//! closure-backed implementation [`ExecFn`]. The common handle type is
//! [`ExecutorRef`], an `Arc<dyn Execute<T>>` suitable for sharing across the
//! runtime.
//!
//! The dispatcher calls `execute` exactly once per dispatched item. The
//! outcome taxonomy is deliberately small: `Ok(())` is success, `Err` is a
//! failure that the pool logs and drops (no retry). Cancellation is never
//! returned by `execute` — it is observed on the execution handle before
//! `execute` is ever called.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WorkError;
use crate::work::item::WorkItem;

/// Shared handle to an executor (`Arc<dyn Execute<T>>`).
pub type ExecutorRef<T> = Arc<dyn Execute<T>>;

/// # The collaborator-supplied execution function.
///
/// Implementations hold the business logic the dispatcher is agnostic to
/// (reply generation, outbound sends, ...). They may block for arbitrarily
/// long on network calls — bounding that is exactly what the per-session
/// permits and the worker pool are for.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use lanevisor::{Execute, WorkError, WorkItem};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Execute<String> for Echo {
///     async fn execute(&self, item: WorkItem<String>) -> Result<(), WorkError> {
///         println!("{}: {}", item.session(), item.payload());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Execute<T>: Send + Sync + 'static {
    /// Runs one work item to completion.
    ///
    /// Errors are recovered by the worker pool (logged, published as
    /// `ItemFailed`) and never propagate further; panics are caught the
    /// same way.
    async fn execute(&self, item: WorkItem<T>) -> Result<(), WorkError>;
}

/// Closure-backed executor implementation.
///
/// Wraps a closure that *creates* a new future per item. No shared mutable
/// state is implied; if the closure needs shared state, capture an
/// `Arc<...>` explicitly.
///
/// ## Example
/// ```rust
/// use lanevisor::{ExecFn, ExecutorRef, WorkError, WorkItem};
///
/// let exec: ExecutorRef<String> = ExecFn::arc(|item: WorkItem<String>| async move {
///     let _ = item.payload();
///     Ok::<_, WorkError>(())
/// });
/// ```
pub struct ExecFn<F> {
    f: F,
}

impl<F> ExecFn<F> {
    /// Creates a new closure-backed executor.
    ///
    /// Prefer [`ExecFn::arc`] when you immediately need an [`ExecutorRef`].
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the executor and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<T, F, Fut> Execute<T> for ExecFn<F>
where
    T: Send + 'static,
    F: Fn(WorkItem<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
{
    async fn execute(&self, item: WorkItem<T>) -> Result<(), WorkError> {
        (self.f)(item).await
    }
}
