use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::error::BrokerError;

use super::{
    config::BrokerConfig,
    dispatch::{self, Delivery, SubscriberSlot},
    subscription::{Subscription, SubscriptionId},
};

/// In-process, topic-keyed publish/subscribe broker.
///
/// Each subscriber owns a bounded FIFO queue; publishing fans a payload out to
/// every current subscriber of the topic through ephemeral, timeout-guarded
/// dispatch workers (see the [module docs](crate::broker)).
///
/// ### Properties
/// - **Fire-and-forget**: `Ok` from [`publish`](Broker::publish) means "dispatch scheduled".
/// - **Bounded**: slow consumers lose messages instead of slowing publishers.
/// - **Deterministic shutdown**: [`stop`](Broker::stop) returns after every
///   dispatch worker has exited.
///
/// Must be used from within a tokio runtime (publish spawns workers).
pub struct Broker {
    cfg: BrokerConfig,
    topics: RwLock<HashMap<Arc<str>, Vec<Arc<SubscriberSlot>>>>,
    stop: CancellationToken,
    shards: TaskTracker,
    next_id: AtomicU64,
}

impl Broker {
    /// Creates a broker with [`BrokerConfig::default`].
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    /// Creates a broker with the given configuration.
    pub fn with_config(cfg: BrokerConfig) -> Self {
        Self {
            cfg,
            topics: RwLock::new(HashMap::new()),
            stop: CancellationToken::new(),
            shards: TaskTracker::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the broker configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.cfg
    }

    /// Subscribes to `topic`, returning the receive-only handle of a new bounded queue.
    ///
    /// Fails with [`BrokerError::Stopped`] after [`stop`](Broker::stop).
    pub async fn subscribe(&self, topic: &str) -> Result<Subscription, BrokerError> {
        let (tx, rx) = mpsc::channel(self.cfg.queue_capacity_clamped());
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut topics = self.topics.write().await;
        if self.stop.is_cancelled() {
            return Err(BrokerError::Stopped);
        }

        let key: Arc<str> = topics
            .get_key_value(topic)
            .map(|(k, _)| Arc::clone(k))
            .unwrap_or_else(|| Arc::from(topic));
        let subs = topics.entry(Arc::clone(&key)).or_default();
        // Handles dropped without unsubscribing are pruned lazily.
        subs.retain(|s| !s.is_closed());
        subs.push(Arc::new(SubscriberSlot::new(id, tx)));

        Ok(Subscription::new(id, key, rx))
    }

    /// Removes the subscriber `id` from `topic`.
    ///
    /// Missing topic or unknown id is a silent success. The subscriber's queue stays
    /// readable until drained. Fails with [`BrokerError::Stopped`] after stop.
    pub async fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> Result<(), BrokerError> {
        let mut topics = self.topics.write().await;
        if self.stop.is_cancelled() {
            return Err(BrokerError::Stopped);
        }

        if let Some(subs) = topics.get_mut(topic) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                topics.remove(topic);
            }
        }
        Ok(())
    }

    /// Publishes `payload` to every current subscriber of `topic`.
    ///
    /// Returns as soon as dispatch is scheduled.
    ///
    /// ### Errors
    /// - [`BrokerError::Stopped`] after [`stop`](Broker::stop)
    /// - [`BrokerError::NoSuchTopic`] if the topic has no current subscribers
    pub async fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> Result<(), BrokerError> {
        // Spawning under the read lock orders every spawn before `stop` takes the
        // write lock, so `stop` never closes the tracker ahead of a late spawn.
        let topics = self.topics.read().await;
        if self.stop.is_cancelled() {
            return Err(BrokerError::Stopped);
        }
        let deliveries: Vec<Delivery> = match topics.get(topic) {
            Some(subs) if !subs.is_empty() => subs.iter().map(Delivery::sequence).collect(),
            _ => return Err(BrokerError::NoSuchTopic),
        };

        dispatch::spawn_shards(
            &self.shards,
            deliveries,
            payload.into(),
            self.cfg.shard_size_clamped(),
            self.cfg.publish_timeout,
            &self.stop,
        );
        drop(topics);
        Ok(())
    }

    /// Stops the broker. Idempotent.
    ///
    /// 1. Fires the stop signal (in-flight dispatch abandons remaining subscribers)
    /// 2. Drops every broker-held queue sender (drained queues then report closed)
    /// 3. Waits for all dispatch workers to exit
    pub async fn stop(&self) {
        self.stop.cancel();

        let dropped = {
            let mut topics = self.topics.write().await;
            let n: usize = topics.values().map(Vec::len).sum();
            topics.clear();
            n
        };

        self.shards.close();
        self.shards.wait().await;
        if dropped > 0 {
            debug!(subscribers = dropped, "broker stopped");
        }
    }

    /// True after [`stop`](Broker::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Number of topics with at least one subscriber.
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }

    /// Number of current subscribers of `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().await.get(topic).map_or(0, Vec::len)
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}
