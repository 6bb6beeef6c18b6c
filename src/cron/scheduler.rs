//! # Cron scheduler: single worker, per-firing job tasks.
//!
//! ```text
//! add_job ──► add channel ────┐
//! remove_job ► remove channel ┤
//! stop ─────► shutdown token ─┤
//!                             ▼
//!                  worker loop (one task)
//!   retain scheduled ─► sort by next ─► select!{ shutdown | timer | add | remove }
//!                                                     │
//!                                        timer: fire every job with next <= now
//!                                               ─► JobTracker.spawn(job.run())
//! ```
//!
//! ## Rules
//! - Job ids are unique and increase from 1 per scheduler
//! - A job whose schedule returns `None` after firing is dropped at the next wake-up
//! - Jobs added or removed while the worker waits take effect on the next iteration
//! - A removed job that is already running runs to completion
//! - `stop` joins the worker, then waits for every in-flight job body
//! - Concurrent `stop` calls all return once that wait is over
//! - A job body may add or remove jobs on its own scheduler
//! - A panicking job body is logged and does not affect the worker or other jobs

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::clock::{Clock, SystemClock};
use crate::error::CronError;

use super::{
    config::CronConfig,
    job::{JobId, JobRef},
    schedule::Schedule,
};

/// A job on its way into the worker.
struct Pending {
    id: JobId,
    job: JobRef,
    first_at: SystemTime,
    schedule: Box<dyn Schedule>,
}

/// A job owned by the worker.
struct Entry {
    id: JobId,
    job: JobRef,
    schedule: Box<dyn Schedule>,
    prev: Option<SystemTime>,
    /// `None` means unscheduled.
    next: Option<SystemTime>,
}

/// Receivers and pre-start queue, handed to the worker on `start`.
struct Idle {
    add_rx: mpsc::Receiver<Pending>,
    remove_rx: mpsc::Receiver<JobId>,
    queued: Vec<Pending>,
}

enum Phase {
    Idle(Idle),
    Running(JoinHandle<()>),
    Stopped,
}

/// Builder for [`Cron`].
#[derive(Default)]
pub struct CronBuilder {
    cfg: CronConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl CronBuilder {
    /// Sets the scheduler configuration.
    pub fn config(mut self, cfg: CronConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the clock used for fire instants. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds a scheduler in the not-started state.
    pub fn build(self) -> Cron {
        let (add_tx, add_rx) = mpsc::channel(self.cfg.add_queue_clamped());
        let (remove_tx, remove_rx) = mpsc::channel(self.cfg.remove_queue_clamped());
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));

        Cron {
            cfg: self.cfg,
            clock,
            next_id: AtomicU64::new(1),
            started: AtomicBool::new(false),
            add_tx,
            remove_tx,
            phase: Mutex::new(Phase::Idle(Idle {
                add_rx,
                remove_rx,
                queued: Vec::new(),
            })),
            shutdown: CancellationToken::new(),
            exited: CancellationToken::new(),
            jobs: TaskTracker::new(),
        }
    }
}

/// Runs named jobs on their schedules.
///
/// ### Lifecycle
/// `build` → [`start`](Cron::start) (once) → [`stop`](Cron::stop) (once).
/// Both transitions are idempotent; a stopped scheduler cannot be restarted.
///
/// ### Clock
/// Fire instants are computed on the injected [`Clock`] while the worker sleeps on
/// tokio timers, so the clock must advance with tokio time. [`SystemClock`] does,
/// including under a paused test runtime. Use [`now`](Cron::now) to derive
/// `first_at` values on the scheduler's timeline.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use flowkit::{Cron, Every, JobFn};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), flowkit::CronError> {
///     let cron = Cron::new();
///     let first = cron.now() + Duration::from_secs(1);
///     let id = cron
///         .add_job(JobFn::arc("heartbeat", || async {}), first, Every(Duration::from_secs(5)))
///         .await?;
///
///     cron.start();
///     cron.remove_job(id).await;
///     cron.stop().await;
///     assert!(cron.is_stopped());
///     Ok(())
/// }
/// ```
pub struct Cron {
    cfg: CronConfig,
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
    started: AtomicBool,
    add_tx: mpsc::Sender<Pending>,
    remove_tx: mpsc::Sender<JobId>,
    phase: Mutex<Phase>,
    shutdown: CancellationToken,
    /// Fired by the `stop` call that owned the shutdown, once jobs are drained.
    exited: CancellationToken,
    jobs: TaskTracker,
}

impl Cron {
    /// Creates a scheduler with default configuration and the system clock.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns a builder.
    pub fn builder() -> CronBuilder {
        CronBuilder::default()
    }

    /// Returns the scheduler configuration.
    pub fn config(&self) -> &CronConfig {
        &self.cfg
    }

    /// Current instant on the scheduler's clock.
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Registers `job` to fire first at `first_at`, then as `schedule` dictates.
    ///
    /// If `first_at` has already passed when the worker takes the job in, the first
    /// firing is `schedule.next_after(now)` instead.
    ///
    /// Before [`start`](Cron::start) the job is queued directly; afterwards this
    /// suspends until the worker accepts it.
    ///
    /// Fails with [`CronError::Stopped`] after [`stop`](Cron::stop).
    pub async fn add_job<S>(
        &self,
        job: JobRef,
        first_at: SystemTime,
        schedule: S,
    ) -> Result<JobId, CronError>
    where
        S: Schedule,
    {
        if self.is_stopped() {
            return Err(CronError::Stopped);
        }

        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let pending = Pending {
            id,
            job,
            first_at,
            schedule: Box::new(schedule),
        };

        let pending = {
            let mut phase = self.phase.lock();
            match &mut *phase {
                Phase::Idle(idle) => {
                    idle.queued.push(pending);
                    return Ok(id);
                }
                Phase::Stopped => return Err(CronError::Stopped),
                Phase::Running(_) => pending,
            }
        };

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(CronError::Stopped),
            sent = self.add_tx.send(pending) => sent.map(|_| id).map_err(|_| CronError::Stopped),
        }
    }

    /// Unregisters job `id`. Unknown ids and stopped schedulers are ignored.
    ///
    /// A firing already in progress runs to completion.
    pub async fn remove_job(&self, id: JobId) {
        {
            let mut phase = self.phase.lock();
            match &mut *phase {
                Phase::Idle(idle) => {
                    idle.queued.retain(|p| p.id != id);
                    return;
                }
                Phase::Stopped => return,
                Phase::Running(_) => {}
            }
        }

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {}
            _ = self.remove_tx.send(id) => {}
        }
    }

    /// Spawns the worker. Idempotent; no-op after [`stop`](Cron::stop).
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut phase = self.phase.lock();
        let idle = match std::mem::replace(&mut *phase, Phase::Stopped) {
            Phase::Idle(idle) => idle,
            other => {
                *phase = other;
                return;
            }
        };

        let worker = Worker {
            clock: Arc::clone(&self.clock),
            idle_sleep: self.cfg.idle_sleep,
            shutdown: self.shutdown.clone(),
            jobs: self.jobs.clone(),
            add_rx: idle.add_rx,
            remove_rx: idle.remove_rx,
            entries: Vec::with_capacity(idle.queued.len()),
        };
        self.started.store(true, Ordering::Release);
        *phase = Phase::Running(tokio::spawn(worker.run(idle.queued)));
    }

    /// Stops the scheduler. Idempotent.
    ///
    /// 1. Marks the scheduler stopped (further `add_job` calls fail)
    /// 2. Wakes and joins the worker (no new firings after this)
    /// 3. Waits for every in-flight job body to return
    ///
    /// Later or concurrent calls wait for the first one to finish.
    /// Never call this from inside a job body: it would wait on itself.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let phase = std::mem::replace(&mut *self.phase.lock(), Phase::Stopped);

        match phase {
            Phase::Running(worker) => {
                info!("cron stopping");
                if let Err(e) = worker.await {
                    error!(error = %e, "cron worker failed");
                }
            }
            Phase::Idle(idle) => {
                debug!(dropped = idle.queued.len(), "cron stopped before start");
            }
            Phase::Stopped => {
                self.exited.cancelled().await;
                return;
            }
        }

        self.jobs.close();
        self.jobs.wait().await;
        info!("cron exited");
        self.exited.cancel();
    }

    /// True after [`stop`](Cron::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// True once [`start`](Cron::start) has spawned the worker.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

impl Default for Cron {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Cron {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// State owned by the worker task.
struct Worker {
    clock: Arc<dyn Clock>,
    idle_sleep: Duration,
    shutdown: CancellationToken,
    jobs: TaskTracker,
    add_rx: mpsc::Receiver<Pending>,
    remove_rx: mpsc::Receiver<JobId>,
    entries: Vec<Entry>,
}

impl Worker {
    async fn run(mut self, queued: Vec<Pending>) {
        info!(jobs = queued.len(), "cron started");
        let now = self.clock.now();
        for p in queued {
            self.admit(p, now);
        }

        loop {
            self.entries.retain(|e| {
                let keep = e.next.is_some();
                if !keep {
                    debug!(job = %e.id, name = e.job.name(), "cron job unscheduled");
                }
                keep
            });
            self.entries.sort_by_key(|e| e.next);

            let now = self.clock.now();
            let wait = match self.entries.first().and_then(|e| e.next) {
                Some(next) => next.duration_since(now).unwrap_or(Duration::ZERO),
                None => self.idle_sleep,
            };

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = time::sleep(wait) => {
                    let now = self.clock.now();
                    self.fire_due(now);
                }
                Some(p) = self.add_rx.recv() => {
                    let now = self.clock.now();
                    self.admit(p, now);
                }
                Some(id) = self.remove_rx.recv() => self.remove(id),
            }
        }

        debug!(jobs = self.entries.len(), "cron worker exiting");
    }

    /// Takes in a new job and decides its first fire instant.
    fn admit(&mut self, p: Pending, now: SystemTime) {
        let next = if p.first_at >= now {
            Some(p.first_at)
        } else {
            p.schedule.next_after(now)
        };
        debug!(job = %p.id, name = p.job.name(), "cron job added");

        self.entries.push(Entry {
            id: p.id,
            job: p.job,
            schedule: p.schedule,
            prev: None,
            next,
        });
    }

    fn remove(&mut self, id: JobId) {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        if self.entries.len() != before {
            debug!(job = %id, "cron job removed");
        }
    }

    /// Fires every job due at `now`. Entries are sorted by `next`.
    fn fire_due(&mut self, now: SystemTime) {
        let tracker = &self.jobs;
        for e in &mut self.entries {
            match e.next {
                Some(next) if next <= now => {}
                _ => break,
            }
            e.prev = e.next;
            e.next = e.schedule.next_after(now);
            debug!(job = %e.id, prev = ?e.prev, next = ?e.next, "cron job rescheduled");
            launch(tracker, e.id, Arc::clone(&e.job));
        }
    }
}

/// Runs one firing of `job` on the job tracker.
fn launch(tracker: &TaskTracker, id: JobId, job: JobRef) {
    tracker.spawn(async move {
        debug!(job = %id, name = job.name(), "cron job firing");
        if let Err(panic_err) = AssertUnwindSafe(job.run()).catch_unwind().await {
            let info = if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
                (*msg).to_string()
            } else if let Some(msg) = panic_err.downcast_ref::<String>() {
                msg.clone()
            } else {
                "unknown panic".to_string()
            };
            error!(job = %id, name = job.name(), panic = %info, "cron job panicked");
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::cron::{Every, JobFn, Once};

    fn counter(name: &'static str) -> (JobRef, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let job: JobRef = JobFn::arc(name, move || {
            let h = Arc::clone(&h);
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
        });
        (job, hits)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_recurring_job_fires_each_period() {
        let cron = Cron::new();
        let (job, hits) = counter("every-2s");
        cron.add_job(job, cron.now() + secs(2), Every(secs(2)))
            .await
            .unwrap();
        cron.start();

        time::sleep(Duration::from_millis(6_500)).await;
        cron.stop().await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_exactly_once() {
        let cron = Cron::new();
        cron.start();
        let (job, hits) = counter("once");
        cron.add_job(job, cron.now() + secs(1), Once).await.unwrap();

        time::sleep(secs(10)).await;
        cron.stop().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_job_never_fires() {
        let cron = Cron::new();
        let (job, hits) = counter("removed");
        let id = cron
            .add_job(job, cron.now() + secs(1), Every(secs(1)))
            .await
            .unwrap();
        cron.start();
        cron.remove_job(id).await;

        time::sleep(secs(5)).await;
        cron.stop().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_before_start_drops_queued_job() {
        let cron = Cron::new();
        let (job, hits) = counter("queued");
        let id = cron.add_job(job, cron.now(), Once).await.unwrap();
        cron.remove_job(id).await;
        cron.start();

        time::sleep(secs(1)).await;
        cron.stop().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_first_at_falls_back_to_schedule() {
        let cron = Cron::new();
        let (job, hits) = counter("late");
        time::sleep(secs(10)).await;
        let stale = cron.now() - secs(5);
        cron.start();
        cron.add_job(job, stale, Every(secs(3))).await.unwrap();

        time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        time::sleep(secs(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        cron.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_increase_from_one() {
        let cron = Cron::new();
        let (a, _) = counter("a");
        let (b, _) = counter("b");
        let first = cron.add_job(a, cron.now() + secs(60), Once).await.unwrap();
        cron.start();
        let second = cron.add_job(b, cron.now() + secs(60), Once).await.unwrap();
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 2);
        cron.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_running_job() {
        let cron = Cron::new();
        let finished = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&finished);
        let job: JobRef = JobFn::arc("slow", move || {
            let f = Arc::clone(&f);
            async move {
                time::sleep(secs(3)).await;
                f.store(true, Ordering::SeqCst);
            }
        });
        cron.add_job(job, cron.now() + secs(1), Once).await.unwrap();
        cron.start();

        time::sleep(Duration::from_millis(1_500)).await;
        assert!(!finished.load(Ordering::SeqCst));
        cron.stop().await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_stops_both_wait_for_running_job() {
        let cron = Cron::new();
        let finished = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&finished);
        let job: JobRef = JobFn::arc("slow", move || {
            let f = Arc::clone(&f);
            async move {
                time::sleep(secs(3)).await;
                f.store(true, Ordering::SeqCst);
            }
        });
        cron.add_job(job, cron.now() + secs(1), Once).await.unwrap();
        cron.start();
        time::sleep(Duration::from_millis(1_500)).await;

        let (first, second) = tokio::join!(
            async {
                cron.stop().await;
                finished.load(Ordering::SeqCst)
            },
            async {
                cron.stop().await;
                finished.load(Ordering::SeqCst)
            },
        );
        assert!(first);
        assert!(second);

        // A stop after completion returns at once.
        cron.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_can_add_job_to_own_scheduler() {
        let cron = Arc::new(Cron::new());
        let (child, hits) = counter("child");

        let handle: Weak<Cron> = Arc::downgrade(&cron);
        let parent: JobRef = JobFn::arc("parent", move || {
            let handle = Weak::clone(&handle);
            let child = Arc::clone(&child);
            async move {
                if let Some(cron) = handle.upgrade() {
                    let at = cron.now() + secs(1);
                    cron.add_job(child, at, Once).await.unwrap();
                }
            }
        });
        cron.add_job(parent, cron.now() + secs(1), Once)
            .await
            .unwrap();
        cron.start();

        time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        time::sleep(secs(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        cron.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_can_remove_job_from_own_scheduler() {
        let cron = Arc::new(Cron::new());
        let (ticker, hits) = counter("ticker");
        let ticker_id = cron
            .add_job(ticker, cron.now() + secs(1), Every(secs(1)))
            .await
            .unwrap();

        let handle: Weak<Cron> = Arc::downgrade(&cron);
        let remover: JobRef = JobFn::arc("remover", move || {
            let handle = Weak::clone(&handle);
            async move {
                if let Some(cron) = handle.upgrade() {
                    cron.remove_job(ticker_id).await;
                }
            }
        });
        cron.add_job(remover, cron.now() + Duration::from_millis(2_500), Once)
            .await
            .unwrap();
        cron.start();

        time::sleep(secs(6)).await;
        cron.stop().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_does_not_stop_scheduler() {
        let cron = Cron::new();
        let boom: JobRef = JobFn::arc("boom", || async { panic!("job exploded") });
        let (job, hits) = counter("survivor");
        cron.add_job(boom, cron.now() + secs(1), Every(secs(1)))
            .await
            .unwrap();
        cron.add_job(job, cron.now() + secs(1), Every(secs(1)))
            .await
            .unwrap();
        cron.start();

        time::sleep(Duration::from_millis(3_500)).await;
        cron.stop().await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_is_idempotent() {
        let cron = Cron::new();
        assert!(!cron.is_started());
        cron.start();
        cron.start();
        assert!(cron.is_started());

        cron.stop().await;
        cron.stop().await;
        assert!(cron.is_stopped());

        cron.start();
        let (job, _) = counter("late");
        let err = cron.add_job(job, cron.now(), Once).await.unwrap_err();
        assert!(matches!(err, CronError::Stopped));
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let cron = Cron::new();
        let (job, hits) = counter("never");
        cron.add_job(job, cron.now(), Once).await.unwrap();
        cron.stop().await;
        cron.start();
        assert!(!cron.is_started());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
