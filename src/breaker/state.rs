//! # Breaker states and counters.

use std::fmt;

/// Circuit breaker state.
///
/// ```text
///            trip_when(counts) on failure
///   Closed ───────────────────────────────► Open
///     ▲                                      │ open_interval elapsed
///     │ max_retries consecutive successes    ▼
///     └────────────────────────────────── HalfOpen
///                                            │ any failure
///                                            └────────► Open
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected until the open window elapses.
    Open,
    /// A bounded batch of trial calls is admitted.
    HalfOpen,
}

impl State {
    /// Returns a short stable label for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Outcome counters for the current window.
///
/// Cleared on every state change and on every Closed-window rollover.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    /// Operations admitted in this window.
    pub tasks: u32,
    /// Successful operations in this window.
    pub total_successes: u32,
    /// Failed operations in this window.
    pub total_failures: u32,
    /// Successes since the last failure.
    pub consecutive_successes: u32,
    /// Failures since the last success.
    pub consecutive_failures: u32,
}

impl Counts {
    pub(super) fn on_admit(&mut self) {
        self.tasks = self.tasks.saturating_add(1);
    }

    pub(super) fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    pub(super) fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    pub(super) fn clear(&mut self) {
        *self = Counts::default();
    }
}
