//! # Broker configuration.
//!
//! Provides [`BrokerConfig`] and the named defaults it is built from.
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → clamped to 1 (a zero-capacity queue cannot buffer)
//! - `shard_size = 0` → clamped to 1
//! - `publish_timeout = 0s` → a subscriber whose queue is full is skipped immediately

use std::time::Duration;

/// Buffered messages per subscriber queue.
pub const CACHE_MESSAGE_PER_CHAN: usize = 10;

/// Per-subscriber delivery deadline for one publish.
pub const DEFAULT_PUB_TIMEOUT: Duration = Duration::from_millis(10);

/// Subscribers served by one dispatch worker during one publish.
pub const DEFAULT_SHARD_SIZE: usize = 100;

/// Configuration for a [`Broker`](crate::Broker).
///
/// ## Field semantics
/// - `queue_capacity`: bounded FIFO size of every subscriber queue
/// - `publish_timeout`: how long a dispatch worker waits on one full queue before skipping it
/// - `shard_size`: subscribers per dispatch worker
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// Capacity of each subscriber's queue.
    pub queue_capacity: usize,

    /// Maximum wait per subscriber per publish.
    ///
    /// A slow consumer costs its dispatch worker at most this long per message;
    /// after that the message is dropped for that subscriber only.
    pub publish_timeout: Duration,

    /// Number of subscribers handled sequentially by one dispatch worker.
    pub shard_size: usize,
}

impl BrokerConfig {
    /// Returns the queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Returns the shard size clamped to a minimum of 1.
    #[inline]
    pub fn shard_size_clamped(&self) -> usize {
        self.shard_size.max(1)
    }
}

impl Default for BrokerConfig {
    /// Default configuration:
    ///
    /// - `queue_capacity = 10` ([`CACHE_MESSAGE_PER_CHAN`])
    /// - `publish_timeout = 10ms` ([`DEFAULT_PUB_TIMEOUT`])
    /// - `shard_size = 100` ([`DEFAULT_SHARD_SIZE`])
    fn default() -> Self {
        Self {
            queue_capacity: CACHE_MESSAGE_PER_CHAN,
            publish_timeout: DEFAULT_PUB_TIMEOUT,
            shard_size: DEFAULT_SHARD_SIZE,
        }
    }
}
