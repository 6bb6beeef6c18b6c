//! # Injectable time sources.
//!
//! The [`CircuitBreaker`](crate::CircuitBreaker) compares deadlines against
//! [`Clock::now`], and the [`Cron`](crate::Cron) scheduler uses it to decide which
//! jobs are due and to feed schedules. Production code uses [`SystemClock`]; tests
//! substitute a [`ManualClock`] or run [`SystemClock`] under paused tokio time.
//!
//! ## Rules
//! - `now()` is cheap and never blocks.
//! - [`SystemClock`] never goes backwards: it is a wall-clock reading taken once
//!   and advanced by the tokio timer's monotonic `Instant`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tokio::time::Instant;

/// Source of "now" for time-driven transitions.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant.
    fn now(&self) -> SystemTime;
}

/// Wall clock anchored at construction and advanced monotonically.
///
/// Because the monotonic part comes from [`tokio::time::Instant`], this clock
/// follows paused/advanced tokio time (`#[tokio::test(start_paused = true)]`),
/// which keeps the scheduler's timers and its notion of "now" on one timeline.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    wall: SystemTime,
    mono: Instant,
}

impl SystemClock {
    /// Anchors a new clock at the current wall-clock time.
    pub fn new() -> Self {
        Self {
            wall: SystemTime::now(),
            mono: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> SystemTime {
        self.wall + self.mono.elapsed()
    }
}

/// Manually driven clock for deterministic tests.
///
/// Clones share the same time.
///
/// # Example
/// ```
/// use std::time::{Duration, SystemTime};
/// use flowkit::{Clock, ManualClock};
///
/// let clock = ManualClock::new(SystemTime::UNIX_EPOCH);
/// clock.advance(Duration::from_secs(3));
/// assert_eq!(clock.now(), SystemTime::UNIX_EPOCH + Duration::from_secs(3));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: SystemTime,
    offset_nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: SystemTime) -> Self {
        Self {
            base: start,
            offset_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a clock frozen at the current wall-clock time.
    pub fn starting_now() -> Self {
        Self::new(SystemTime::now())
    }

    /// Moves time forward by `d`.
    pub fn advance(&self, d: Duration) {
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Sets time to `at`. Instants before the clock's start are clamped to it.
    pub fn set(&self, at: SystemTime) {
        let offset = at.duration_since(self.base).unwrap_or(Duration::ZERO);
        let nanos = u64::try_from(offset.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.store(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> SystemTime {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}
