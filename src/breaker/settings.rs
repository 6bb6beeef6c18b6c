//! # Circuit breaker policy.
//!
//! [`Settings`] bundles the knobs that decide **when** a breaker opens and
//! **how long** it stays open: public fields, a documented `Default`, and
//! `with_*` builders.
//!
//! ## Callback re-entrancy
//! `trip_when` and `on_state_change` are invoked while the breaker's lock is held.
//! They must not call back into the same breaker (that deadlocks).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::state::{Counts, State};

/// Closed-window length after which counters roll over.
pub const RESET_COUNTER_INTERVAL: Duration = Duration::from_secs(60);

/// Time spent in Open before probing in HalfOpen.
pub const OPEN_INTERVAL: Duration = Duration::from_secs(60);

/// Consecutive failures above which [`default_trip_when`] trips regardless of ratio.
pub const DEFAULT_CONSECUTIVE_FAILURES: u32 = 10;

/// Predicate deciding whether a failure in Closed should open the breaker.
pub type TripWhen = Arc<dyn Fn(&Counts) -> bool + Send + Sync>;

/// Callback observing `(from, to)` state changes.
pub type OnStateChange = Arc<dyn Fn(State, State) + Send + Sync>;

/// Default trip predicate: failures outnumber successes in the window
/// (`2 × total_failures > tasks`) or more than
/// [`DEFAULT_CONSECUTIVE_FAILURES`] failures in a row.
///
/// # Example
/// ```
/// use flowkit::{Counts, default_trip_when};
///
/// let mut c = Counts::default();
/// c.tasks = 4;
/// c.total_failures = 2;
/// assert!(!default_trip_when(&c));
/// c.total_failures = 3;
/// assert!(default_trip_when(&c));
/// ```
pub fn default_trip_when(counts: &Counts) -> bool {
    u64::from(counts.total_failures) * 2 > u64::from(counts.tasks)
        || counts.consecutive_failures > DEFAULT_CONSECUTIVE_FAILURES
}

/// Circuit breaker policy parameters.
///
/// ## Field semantics
/// - `max_retries`: HalfOpen trial budget and the consecutive successes needed to close (min 1)
/// - `reset_counter_interval`: Closed-window length
/// - `open_interval`: time in Open before HalfOpen
/// - `trip_when`: Closed → Open predicate, evaluated after each failure
/// - `on_state_change`: optional `(from, to)` observer
#[derive(Clone)]
pub struct Settings {
    /// Name used in log fields.
    pub name: String,
    /// HalfOpen admission budget; clamped to at least 1.
    pub max_retries: u32,
    /// Closed-window length. Zero, or too large to add to the clock, never rolls over.
    pub reset_counter_interval: Duration,
    /// Open-window length. Too large to add to the clock means open until `reset`.
    pub open_interval: Duration,
    /// Closed → Open predicate.
    pub trip_when: TripWhen,
    /// State change observer.
    pub on_state_change: Option<OnStateChange>,
}

impl Settings {
    /// Returns `max_retries` clamped to a minimum of 1.
    #[inline]
    pub fn max_retries_clamped(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Returns settings with a new name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns settings with a new HalfOpen budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns settings with a new Closed-window length.
    pub fn with_reset_counter_interval(mut self, interval: Duration) -> Self {
        self.reset_counter_interval = interval;
        self
    }

    /// Returns settings with a new Open-window length.
    pub fn with_open_interval(mut self, interval: Duration) -> Self {
        self.open_interval = interval;
        self
    }

    /// Returns settings with a custom trip predicate.
    pub fn with_trip_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&Counts) -> bool + Send + Sync + 'static,
    {
        self.trip_when = Arc::new(f);
        self
    }

    /// Returns settings with a state change observer.
    pub fn with_on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(State, State) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(f));
        self
    }
}

impl Default for Settings {
    /// Default policy:
    ///
    /// - `max_retries = 1`
    /// - `reset_counter_interval = 60s` ([`RESET_COUNTER_INTERVAL`])
    /// - `open_interval = 60s` ([`OPEN_INTERVAL`])
    /// - `trip_when = default_trip_when`
    /// - `on_state_change = None`
    fn default() -> Self {
        Self {
            name: String::new(),
            max_retries: 1,
            reset_counter_interval: RESET_COUNTER_INTERVAL,
            open_interval: OPEN_INTERVAL,
            trip_when: Arc::new(default_trip_when),
            on_state_change: None,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("name", &self.name)
            .field("max_retries", &self.max_retries)
            .field("reset_counter_interval", &self.reset_counter_interval)
            .field("open_interval", &self.open_interval)
            .field("on_state_change", &self.on_state_change.is_some())
            .finish_non_exhaustive()
    }
}
