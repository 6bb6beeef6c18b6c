//! # Sharded, timeout-guarded payload delivery.
//!
//! One publish snapshots the topic's subscribers, splits them into shards of
//! [`BrokerConfig::shard_size`](super::BrokerConfig::shard_size) and spawns one
//! ephemeral worker per shard. A worker serves its subscribers sequentially.
//!
//! ## Architecture
//! ```text
//! publish(topic, payload)
//!     │  (read lock: snapshot + sequence)
//!     ├──► shard 0 ─► worker ─► [sub 0] ─► [sub 1] ─► ... ─► [sub 99]
//!     ├──► shard 1 ─► worker ─► [sub 100] ─► ...
//!     └──► shard K ─► worker ─► ...
//!
//! per subscriber (deadline = now + timeout):
//!   select! {
//!       stop signal           → abandon this and every remaining subscriber in the shard
//!       previous attempt done → go on
//!       sleep_until(deadline) → skipped, predecessor's signal handed to the successor
//!   }
//!   select! {
//!       stop signal           → abandon
//!       queue.send()          → delivered
//!       sleep_until(deadline) → skipped (payload dropped for this subscriber only)
//!   }
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: the caller only pays for the snapshot; workers do the waiting.
//! - **Bounded wait**: waiting for the predecessor and sending share one deadline, so one
//!   subscriber costs its shard at most `publish_timeout` per publish.
//! - **Per-subscriber FIFO**: deliveries to one subscriber are chained in publish order,
//!   even when consecutive publishes run on different worker threads. A delivery that
//!   gives up early passes its predecessor's signal on, so the chain never reorders.
//! - **No retries**: a dropped delivery is silent.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::subscription::SubscriptionId;

/// Stand-in deadline for timeouts too large to add to the current instant.
const UNBOUNDED: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Sent by a delivery that skipped before its predecessor finished.
///
/// Carries the predecessor's signal, which the successor must still wait for.
struct Handoff(Option<Finished>);

/// Resolves when a delivery is finished. `Err` means finished without a handoff.
type Finished = oneshot::Receiver<Handoff>;

/// Broker-side end of one subscriber queue.
pub(super) struct SubscriberSlot {
    pub(super) id: SubscriptionId,
    tx: mpsc::Sender<Bytes>,
    /// Completion signal of the most recently sequenced delivery to this slot.
    last: Mutex<Option<Finished>>,
}

impl SubscriberSlot {
    pub(super) fn new(id: SubscriptionId, tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            id,
            tx,
            last: Mutex::new(None),
        }
    }

    /// True once the subscriber dropped its handle.
    pub(super) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One pending delivery of one payload to one subscriber.
pub(super) struct Delivery {
    slot: Arc<SubscriberSlot>,
    /// Resolves when the previous delivery to the same slot is finished.
    after: Option<Finished>,
    /// Dropped (or sent a [`Handoff`]) when this delivery is finished.
    done: oneshot::Sender<Handoff>,
}

impl Delivery {
    /// Reserves the next position in `slot`'s delivery order.
    pub(super) fn sequence(slot: &Arc<SubscriberSlot>) -> Self {
        let (done, finished) = oneshot::channel();
        let after = slot.last.lock().replace(finished);
        Self {
            slot: Arc::clone(slot),
            after,
            done,
        }
    }

    /// Attempts the delivery within `timeout`. Returns `false` if the stop signal fired.
    async fn deliver(self, payload: &Bytes, timeout: Duration, stop: &CancellationToken) -> bool {
        let Delivery {
            slot,
            mut after,
            done,
        } = self;
        let now = time::Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + UNBOUNDED);

        while let Some(mut previous) = after.take() {
            tokio::select! {
                biased;
                _ = stop.cancelled() => return false,
                handoff = &mut previous => after = handoff.ok().and_then(|Handoff(next)| next),
                _ = time::sleep_until(deadline) => {
                    let _ = done.send(Handoff(Some(previous)));
                    return true;
                }
            }
        }

        let stopped = tokio::select! {
            biased;
            _ = stop.cancelled() => true,
            _ = slot.tx.send(payload.clone()) => false,
            _ = time::sleep_until(deadline) => false,
        };

        drop(done);
        !stopped
    }
}

/// Splits `deliveries` into shards and spawns one worker per shard on `tracker`.
pub(super) fn spawn_shards(
    tracker: &TaskTracker,
    deliveries: Vec<Delivery>,
    payload: Bytes,
    shard_size: usize,
    timeout: Duration,
    stop: &CancellationToken,
) {
    let shard_size = shard_size.max(1);
    let mut deliveries = deliveries.into_iter().peekable();

    while deliveries.peek().is_some() {
        let shard: Vec<Delivery> = deliveries.by_ref().take(shard_size).collect();
        let payload = payload.clone();
        let stop = stop.clone();

        tracker.spawn(async move {
            let mut shard = shard.into_iter();
            for delivery in shard.by_ref() {
                if !delivery.deliver(&payload, timeout, &stop).await {
                    break;
                }
            }
            // Remaining deliveries are dropped here, releasing their successors.
            drop(shard);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: SubscriptionId, cap: usize) -> (Arc<SubscriberSlot>, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(cap);
        (Arc::new(SubscriberSlot::new(id, tx)), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_sends_into_queue() {
        let (s, mut rx) = slot(1, 4);
        let stop = CancellationToken::new();
        let ok = Delivery::sequence(&s)
            .deliver(&Bytes::from_static(b"x"), Duration::from_millis(10), &stop)
            .await;
        assert!(ok);
        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"x")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_is_skipped_after_timeout() {
        let (s, mut rx) = slot(1, 1);
        let stop = CancellationToken::new();
        let timeout = Duration::from_millis(10);

        assert!(Delivery::sequence(&s).deliver(&Bytes::from_static(b"1"), timeout, &stop).await);

        let started = time::Instant::now();
        assert!(Delivery::sequence(&s).deliver(&Bytes::from_static(b"2"), timeout, &stop).await);
        assert!(started.elapsed() >= timeout);
        assert!(started.elapsed() < timeout * 2);

        assert_eq!(rx.try_recv().ok(), Some(Bytes::from_static(b"1")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_on_predecessor_shares_the_deadline() {
        let (s, mut rx) = slot(1, 1);
        let stop = CancellationToken::new();
        let timeout = Duration::from_millis(10);
        let p = |b: &'static [u8]| Bytes::from_static(b);

        assert!(Delivery::sequence(&s).deliver(&p(b"1"), timeout, &stop).await);

        // "2" blocks on the full queue; "3" and "4" queue up behind it.
        let second = Delivery::sequence(&s);
        let third = Delivery::sequence(&s);
        let fourth = Delivery::sequence(&s);

        let (two, three, four) = (p(b"2"), p(b"3"), p(b"4"));
        let started = time::Instant::now();
        let (a, b, c) = tokio::join!(
            second.deliver(&two, timeout, &stop),
            third.deliver(&three, timeout, &stop),
            fourth.deliver(&four, timeout, &stop),
        );
        assert!(a && b && c);
        assert!(started.elapsed() < timeout * 2);

        assert_eq!(rx.try_recv().ok(), Some(p(b"1")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_delivery_keeps_successor_behind_predecessor() {
        let (s, mut rx) = slot(1, 1);
        let stop = CancellationToken::new();
        let p = |b: &'static [u8]| Bytes::from_static(b);

        assert!(Delivery::sequence(&s).deliver(&p(b"1"), Duration::from_secs(1), &stop).await);

        let second = Delivery::sequence(&s);
        let third = Delivery::sequence(&s);
        let fourth = Delivery::sequence(&s);

        let slow = tokio::spawn({
            let stop = stop.clone();
            async move { second.deliver(&p(b"2"), Duration::from_secs(1), &stop).await }
        });
        // Gives up on "2" long before "2" gets a free slot.
        assert!(third.deliver(&p(b"3"), Duration::from_millis(10), &stop).await);

        let last = tokio::spawn({
            let stop = stop.clone();
            async move { fourth.deliver(&p(b"4"), Duration::from_secs(1), &stop).await }
        });
        time::sleep(Duration::from_millis(50)).await;

        assert_eq!(rx.recv().await, Some(p(b"1")));
        assert_eq!(rx.recv().await, Some(p(b"2")));
        assert_eq!(rx.recv().await, Some(p(b"4")));
        assert!(slow.await.unwrap_or(false));
        assert!(last.await.unwrap_or(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_abandons_delivery() {
        let (s, _rx) = slot(1, 1);
        let stop = CancellationToken::new();
        let timeout = Duration::from_secs(60);
        assert!(Delivery::sequence(&s).deliver(&Bytes::from_static(b"1"), timeout, &stop).await);

        stop.cancel();
        assert!(!Delivery::sequence(&s).deliver(&Bytes::from_static(b"2"), timeout, &stop).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sequenced_deliveries_keep_publish_order() {
        let (s, mut rx) = slot(1, 256);
        let stop = CancellationToken::new();
        let tracker = TaskTracker::new();

        for i in 0u32..200 {
            let delivery = Delivery::sequence(&s);
            spawn_shards(
                &tracker,
                vec![delivery],
                Bytes::from(i.to_be_bytes().to_vec()),
                100,
                Duration::from_secs(1),
                &stop,
            );
        }
        tracker.close();
        tracker.wait().await;

        for i in 0u32..200 {
            let got = rx.recv().await.unwrap_or_default();
            assert_eq!(got.as_ref(), i.to_be_bytes().as_slice());
        }
    }

    #[tokio::test]
    async fn test_shards_cover_every_subscriber() {
        let stop = CancellationToken::new();
        let tracker = TaskTracker::new();
        let mut receivers = Vec::new();
        let mut deliveries = Vec::new();
        for id in 0..7 {
            let (s, rx) = slot(id, 2);
            deliveries.push(Delivery::sequence(&s));
            receivers.push(rx);
        }

        spawn_shards(
            &tracker,
            deliveries,
            Bytes::from_static(b"p"),
            3,
            Duration::from_millis(10),
            &stop,
        );
        tracker.close();
        tracker.wait().await;

        for rx in &mut receivers {
            assert_eq!(rx.try_recv().ok(), Some(Bytes::from_static(b"p")));
        }
    }
}
