//! In-process publish/subscribe broker.
//!
//! Topic-keyed fan-out of opaque byte payloads ([`bytes::Bytes`]) to subscribers,
//! with bounded per-subscriber buffering and timeout-guarded delivery.
//!
//! ## Contents
//! - [`Broker`] subscribe / unsubscribe / publish / stop
//! - [`Subscription`] receive-only handle on one subscriber queue
//! - [`BrokerConfig`] queue capacity, publish timeout, shard size
//!
//! ## Quick wiring
//! ```text
//! Broker
//!   topics: RwLock<HashMap<topic, Vec<SubscriberSlot>>>
//!   stop:   CancellationToken ─────────────┐
//!   shards: TaskTracker (dispatch workers) │
//!                                          ▼
//! publish ─► snapshot ─► shard workers ─► select!{ send | stop | timeout }
//! ```
//!
//! ## Trade-off
//! Dropping a message for a slow subscriber is preferred over back-pressuring
//! the publisher. A consumer that keeps up (within
//! [`CACHE_MESSAGE_PER_CHAN`] buffered messages) reliably receives everything.
//!
//! ## Example
//! ```rust
//! use flowkit::Broker;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), flowkit::BrokerError> {
//!     let broker = Broker::new();
//!     let mut sub = broker.subscribe("orders").await?;
//!
//!     broker.publish("orders", "created:42").await?;
//!     assert_eq!(sub.recv().await.as_deref(), Some(&b"created:42"[..]));
//!
//!     broker.unsubscribe("orders", sub.id()).await?;
//!     broker.stop().await;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod dispatch;
mod subscription;

pub use config::{BrokerConfig, CACHE_MESSAGE_PER_CHAN, DEFAULT_PUB_TIMEOUT, DEFAULT_SHARD_SIZE};
pub use self::core::Broker;
pub use subscription::{Subscription, SubscriptionId};
