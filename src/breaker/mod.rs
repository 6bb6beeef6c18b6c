//! Circuit breaker guarding fallible async operations.
//!
//! ## Contents
//! - [`CircuitBreaker`] execute / state / counts / trip / reset
//! - [`Settings`] policy: trial budget, windows, trip predicate, change observer
//! - [`State`], [`Counts`] observable breaker state
//!
//! ## Quick wiring
//! ```text
//! execute(op) ─► lock ─► refresh(now) ─► admit? ──no──► OpenNow | HalfOpenSaturated
//!                                          │yes
//!                                          ▼
//!                                   op().await ─► on_success | on_failure ─► maybe set_state
//! ```
//!
//! Time comes from an injected [`Clock`](crate::Clock), so tests drive the
//! windows with [`ManualClock`](crate::ManualClock).

mod core;
mod settings;
mod state;

pub use self::core::CircuitBreaker;
pub use settings::{
    DEFAULT_CONSECUTIVE_FAILURES, OPEN_INTERVAL, OnStateChange, RESET_COUNTER_INTERVAL, Settings,
    TripWhen, default_trip_when,
};
pub use state::{Counts, State};
