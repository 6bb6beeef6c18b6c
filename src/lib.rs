//! # flowkit
//!
//! **flowkit** is a small toolkit of in-process control-flow components for
//! tokio services: a pub/sub broker, a circuit breaker, a cron scheduler and a
//! power-of-two-choices load balancer.
//!
//! Each component is independent, owns its own lock (and, for the broker and the
//! scheduler, its own background tasks) and is safe to share across tasks.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  publish(topic, bytes)        execute(op)              add_job(job, first_at, schedule)     get(key)
//!          │                        │                               │                            │
//!          ▼                        ▼                               ▼                            ▼
//! ┌──────────────────┐   ┌─────────────────────┐   ┌───────────────────────────────┐   ┌────────────────────┐
//! │ Broker           │   │ CircuitBreaker      │   │ Cron                          │   │ P2c                │
//! │ RwLock<topics>   │   │ Mutex<state,counts> │   │ worker task + TaskTracker     │   │ Mutex<nodes,loads> │
//! │ shard workers    │   │ Clock               │   │ Clock                         │   │ StdRng, 2 hashers  │
//! └────────┬─────────┘   └──────────┬──────────┘   └───────────────┬───────────────┘   └─────────┬──────────┘
//!          ▼                        ▼                              ▼                             ▼
//!   per-subscriber           Closed / Open /                job.run() per firing           least-loaded of
//!   bounded queues           HalfOpen                                                      two candidates
//! ```
//!
//! ### Shutdown
//! ```text
//! Broker::stop  ─► cancel ─► drop senders ─► wait dispatch shards
//! Cron::stop    ─► cancel ─► join worker  ─► wait in-flight jobs
//! ```
//!
//! ## Features
//! | Area               | Description                                                  | Key types / traits                                  |
//! |--------------------|--------------------------------------------------------------|-----------------------------------------------------|
//! | **Pub/Sub**        | Topic fan-out with bounded queues and timed delivery.        | [`Broker`], [`Subscription`], [`BrokerConfig`]      |
//! | **Circuit breaker**| Closed/Open/HalfOpen admission around fallible async calls.  | [`CircuitBreaker`], [`Settings`], [`State`]         |
//! | **Scheduling**     | Jobs on periodic, one-shot or cron-expression schedules.     | [`Cron`], [`Job`], [`JobFn`], [`Schedule`]          |
//! | **Balancing**      | P2C selection with sticky keys and load counters.            | [`P2c`], [`KeyHasher`]                              |
//! | **Time**           | Injectable clocks for deterministic tests.                   | [`Clock`], [`SystemClock`], [`ManualClock`]         |
//! | **Errors**         | One typed error per component.                               | [`BrokerError`], [`BreakerError`], [`CronError`], [`BalancerError`] |
//!
//! ## Optional features
//! - `logging`: exports `logging::init`, a `tracing-subscriber` installer _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use flowkit::{Broker, BreakerError, CircuitBreaker, Cron, Every, JobFn, P2c, Settings};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = Broker::new();
//!     let mut sub = broker.subscribe("events").await?;
//!     broker.publish("events", "hello").await?;
//!     assert_eq!(sub.recv().await.as_deref(), Some(&b"hello"[..]));
//!
//!     let cb = CircuitBreaker::new(Settings::default().with_name("db"));
//!     let rows: Result<u32, BreakerError<std::io::Error>> = cb.execute(|| async { Ok(3) }).await;
//!     assert_eq!(rows?, 3);
//!
//!     let lb = P2c::new();
//!     lb.add_node("10.0.0.1:80", 0);
//!     assert_eq!(lb.get("session-1")?, "10.0.0.1:80");
//!
//!     let cron = Cron::new();
//!     let first = cron.now() + Duration::from_secs(1);
//!     cron.add_job(JobFn::arc("tick", || async {}), first, Every(Duration::from_secs(1))).await?;
//!     cron.start();
//!     cron.stop().await;
//!
//!     broker.stop().await;
//!     Ok(())
//! }
//! ```
mod balancer;
mod breaker;
mod broker;
mod clock;
mod cron;
mod error;
pub mod logging;

// ---- Public re-exports ----

pub use balancer::{Crc32, Fnv1a32, KeyHasher, P2c};
pub use breaker::{
    CircuitBreaker, Counts, DEFAULT_CONSECUTIVE_FAILURES, OPEN_INTERVAL, OnStateChange,
    RESET_COUNTER_INTERVAL, Settings, State, TripWhen, default_trip_when,
};
pub use broker::{
    Broker, BrokerConfig, CACHE_MESSAGE_PER_CHAN, DEFAULT_PUB_TIMEOUT, DEFAULT_SHARD_SIZE,
    Subscription, SubscriptionId,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use self::cron::{
    CRON_IDLE_SLEEP, Cron, CronBuilder, CronConfig, CronExpr, Every, Job, JobFn, JobId, JobRef,
    Once, Schedule,
};
pub use error::{BalancerError, BreakerError, BrokerError, CronError};
pub use logging::LogLevel;
