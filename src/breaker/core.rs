use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::BreakerError;

use super::{
    settings::Settings,
    state::{Counts, State},
};

/// Mutable breaker state, guarded by one lock.
struct Inner {
    state: State,
    counts: Counts,
    /// Closed: counter rollover. Open: HalfOpen transition. HalfOpen: none.
    /// `None` in Closed or Open means the interval is unbounded.
    deadline: Option<SystemTime>,
}

impl Inner {
    /// Applies time-driven transitions for `now`.
    fn refresh(&mut self, settings: &Settings, now: SystemTime) {
        let Some(deadline) = self.deadline else {
            return;
        };
        if now <= deadline {
            return;
        }
        match self.state {
            State::Closed => {
                self.counts.clear();
                self.deadline = window_end(now, settings.reset_counter_interval);
            }
            State::Open => self.set_state(State::HalfOpen, settings, now),
            State::HalfOpen => {}
        }
    }

    /// Enters `to`, clearing counters and arming the state's deadline.
    ///
    /// `on_state_change` fires only when the state actually changes.
    fn set_state(&mut self, to: State, settings: &Settings, now: SystemTime) {
        let from = self.state;
        self.state = to;
        self.counts.clear();
        self.deadline = match to {
            State::Closed => window_end(now, settings.reset_counter_interval),
            State::Open => now.checked_add(settings.open_interval),
            State::HalfOpen => None,
        };

        if from != to {
            debug!(breaker = %settings.name, %from, %to, "circuit breaker state change");
            if let Some(cb) = &settings.on_state_change {
                cb(from, to);
            }
        }
    }

    fn on_success(&mut self, settings: &Settings, now: SystemTime) {
        self.counts.on_success();
        if self.state == State::HalfOpen
            && self.counts.consecutive_successes >= settings.max_retries_clamped()
        {
            self.set_state(State::Closed, settings, now);
        }
    }

    fn on_failure(&mut self, settings: &Settings, now: SystemTime) {
        self.counts.on_failure();
        match self.state {
            State::Closed if (settings.trip_when)(&self.counts) => {
                self.set_state(State::Open, settings, now);
            }
            State::HalfOpen => self.set_state(State::Open, settings, now),
            _ => {}
        }
    }
}

/// Closed-window end; a zero or unrepresentable interval disables rollover.
fn window_end(now: SystemTime, interval: Duration) -> Option<SystemTime> {
    if interval.is_zero() {
        return None;
    }
    now.checked_add(interval)
}

/// Circuit breaker wrapping user-supplied fallible async operations.
///
/// ### Rules
/// - **Closed**: operations run; after each failure `trip_when(counts)` decides whether to open.
///   Counters roll over every `reset_counter_interval`.
/// - **Open**: [`execute`](CircuitBreaker::execute) fails fast with [`BreakerError::OpenNow`]
///   until `open_interval` has passed, then the breaker reads HalfOpen.
/// - **HalfOpen**: at most `max_retries` trial calls are admitted; any failure reopens,
///   `max_retries` consecutive successes close.
///
/// ### Concurrency
/// One lock covers all state, and `execute` holds it across the operation so HalfOpen
/// trial calls are serialized. Do not hold other locks across `execute`, and never call
/// back into the breaker from `trip_when` or `on_state_change`.
///
/// A trial whose future is dropped before finishing still counts as admitted, which
/// is how a HalfOpen breaker becomes [`BreakerError::HalfOpenSaturated`].
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use flowkit::{BreakerError, CircuitBreaker, Settings, State};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let cb = CircuitBreaker::new(Settings::default().with_open_interval(Duration::from_secs(30)));
///
///     let res: Result<u32, BreakerError<&str>> = cb.execute(|| async { Err("backend down") }).await;
///     assert!(matches!(res, Err(BreakerError::Operation("backend down"))));
///     assert_eq!(cb.state().await, State::Open);
///
///     let res: Result<u32, BreakerError<&str>> = cb.execute(|| async { Ok(1) }).await;
///     assert!(matches!(res, Err(BreakerError::OpenNow)));
/// }
/// ```
pub struct CircuitBreaker {
    settings: Settings,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a Closed breaker driven by the system clock.
    pub fn new(settings: Settings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock::new()))
    }

    /// Creates a Closed breaker driven by `clock`.
    pub fn with_clock(settings: Settings, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let inner = Inner {
            state: State::Closed,
            counts: Counts::default(),
            deadline: window_end(now, settings.reset_counter_interval),
        };
        Self {
            settings,
            clock,
            inner: Mutex::new(inner),
        }
    }

    /// Breaker name from its settings.
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Returns the policy this breaker was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Current state, recomputed against the clock.
    ///
    /// May move Open → HalfOpen or roll the Closed counter window.
    pub async fn state(&self) -> State {
        let mut inner = self.inner.lock().await;
        inner.refresh(&self.settings, self.clock.now());
        inner.state
    }

    /// Snapshot of the current window's counters.
    pub async fn counts(&self) -> Counts {
        let mut inner = self.inner.lock().await;
        inner.refresh(&self.settings, self.clock.now());
        inner.counts
    }

    /// Runs `op` if the breaker admits it and records the outcome.
    ///
    /// ### Errors
    /// - [`BreakerError::OpenNow`] while Open (the operation is not run)
    /// - [`BreakerError::HalfOpenSaturated`] while HalfOpen with no trial budget left
    /// - [`BreakerError::Operation`] carrying the operation's own error
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut inner = self.inner.lock().await;
        inner.refresh(&self.settings, self.clock.now());

        match inner.state {
            State::Open => return Err(BreakerError::OpenNow),
            State::HalfOpen if inner.counts.tasks >= self.settings.max_retries_clamped() => {
                return Err(BreakerError::HalfOpenSaturated);
            }
            _ => {}
        }

        inner.counts.on_admit();
        let result = op().await;

        let now = self.clock.now();
        match &result {
            Ok(_) => inner.on_success(&self.settings, now),
            Err(_) => inner.on_failure(&self.settings, now),
        }
        result.map_err(BreakerError::Operation)
    }

    /// Forces the breaker Open and arms a fresh open window.
    pub async fn trip(&self) {
        let mut inner = self.inner.lock().await;
        inner.set_state(State::Open, &self.settings, self.clock.now());
    }

    /// Forces the breaker Closed, clears counters and arms a fresh counter window.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.set_state(State::Closed, &self.settings, self.clock.now());
    }
}
