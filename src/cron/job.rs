//! # Scheduled job abstraction.
//!
//! [`Job`] is the unit a [`Cron`](crate::Cron) fires; [`JobFn`] wraps a closure that
//! builds a fresh future per firing. Shared handle type is [`JobRef`].
//!
//! A job body runs on its own task, outside any scheduler lock. It may call
//! `add_job`/`remove_job` on its scheduler, but must never call `stop` (the scheduler
//! waits for the job that is waiting for the scheduler).

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

/// Shared handle to a job.
pub type JobRef = Arc<dyn Job>;

/// # Unit of scheduled work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use flowkit::Job;
///
/// struct Compact;
///
/// #[async_trait]
/// impl Job for Compact {
///     fn name(&self) -> &str { "compact" }
///
///     async fn run(&self) {
///         // do work...
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Stable, human-readable job name used in logs.
    fn name(&self) -> &str;

    /// Runs one firing to completion.
    async fn run(&self);
}

/// Closure-backed job.
///
/// Wraps `F: Fn() -> Fut`; every firing calls `F` for a new future, so no state is
/// shared between firings unless the closure captures an `Arc` explicitly.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use flowkit::{JobFn, JobRef};
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let h = Arc::clone(&hits);
/// let job: JobRef = JobFn::arc("tick", move || {
///     let h = Arc::clone(&h);
///     async move { h.fetch_add(1, Ordering::Relaxed); }
/// });
/// assert_eq!(job.name(), "tick");
/// ```
#[derive(Debug)]
pub struct JobFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> JobFn<F> {
    /// Creates a closure-backed job.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the job as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Job for JobFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) {
        (self.f)().await
    }
}

/// Scheduler-assigned job identifier; unique and increasing per scheduler, starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(super) u64);

impl JobId {
    /// Raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
