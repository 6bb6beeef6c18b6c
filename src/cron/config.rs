//! # Scheduler configuration.
//!
//! ## Sentinel values
//! - `add_queue = 0` / `remove_queue = 0` → clamped to 1 (a rendezvous-style hand-off)

use std::time::Duration;

/// Worker sleep when no job is scheduled.
pub const CRON_IDLE_SLEEP: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for a [`Cron`](crate::Cron) scheduler.
///
/// ## Field semantics
/// - `idle_sleep`: timer armed when the job list is empty; add/remove/stop still wake the worker
/// - `add_queue`: capacity of the add channel (min 1); `add_job` suspends while it is full
/// - `remove_queue`: capacity of the remove channel (min 1)
#[derive(Clone, Debug)]
pub struct CronConfig {
    /// Timer length with nothing scheduled.
    pub idle_sleep: Duration,
    /// Add channel capacity.
    pub add_queue: usize,
    /// Remove channel capacity.
    pub remove_queue: usize,
}

impl CronConfig {
    /// Add channel capacity, at least 1.
    #[inline]
    pub fn add_queue_clamped(&self) -> usize {
        self.add_queue.max(1)
    }

    /// Remove channel capacity, at least 1.
    #[inline]
    pub fn remove_queue_clamped(&self) -> usize {
        self.remove_queue.max(1)
    }
}

impl Default for CronConfig {
    /// Default configuration:
    ///
    /// - `idle_sleep = 24h` ([`CRON_IDLE_SLEEP`])
    /// - `add_queue = 1`
    /// - `remove_queue = 1`
    fn default() -> Self {
        Self {
            idle_sleep: CRON_IDLE_SLEEP,
            add_queue: 1,
            remove_queue: 1,
        }
    }
}
