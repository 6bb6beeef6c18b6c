//! # Subscriber handle.
//!
//! [`Subscription`] is the receive-only end of one subscriber queue. Its
//! [`id`](Subscription::id) is the identity passed back to
//! [`Broker::unsubscribe`](crate::Broker::unsubscribe).
//!
//! ## Rules
//! - Payloads arrive in publish order (per topic).
//! - After unsubscribe or broker stop, buffered payloads stay readable; once drained,
//!   `recv()` returns `None` instead of hanging.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Unique (per broker) identity of a subscription.
pub type SubscriptionId = u64;

/// Receive-only handle on a bounded payload queue.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    topic: Arc<str>,
    rx: mpsc::Receiver<Bytes>,
}

impl Subscription {
    pub(super) fn new(id: SubscriptionId, topic: Arc<str>, rx: mpsc::Receiver<Bytes>) -> Self {
        Self { id, topic, rx }
    }

    /// Identity used to unsubscribe.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Topic this subscription listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next payload.
    ///
    /// Returns `None` once the broker dropped this subscriber and the queue is empty.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Takes the next payload if one is buffered.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Number of payloads currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True if no payload is buffered.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// True once the broker side is gone (unsubscribed or stopped).
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }
}
