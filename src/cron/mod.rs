//! Cron-style job scheduler.
//!
//! ## Contents
//! - [`Cron`] add_job / remove_job / start / stop
//! - [`Job`], [`JobFn`], [`JobRef`], [`JobId`] what gets fired
//! - [`Schedule`], [`Every`], [`Once`], [`CronExpr`] when it fires next
//! - [`CronConfig`] idle sleep and channel capacities
//!
//! ## Quick wiring
//! ```text
//! Cron ─► worker task ─► timer ─► TaskTracker ─► job.run()
//!   ▲          ▲
//!   │          └── add / remove channels (capacity 1)
//!   └── shutdown token, joined by stop()
//! ```

mod config;
mod job;
mod schedule;
mod scheduler;

pub use config::{CRON_IDLE_SLEEP, CronConfig};
pub use job::{Job, JobFn, JobId, JobRef};
pub use schedule::{CronExpr, Every, Once, Schedule};
pub use scheduler::{Cron, CronBuilder};
