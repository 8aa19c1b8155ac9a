//! Replay-latest broadcast bus for response events.
//!
//! The bus carries every decoded response to all current and future
//! subscribers. It retains exactly one value - the most recently published
//! response, seeded with the sentinel - and primes each new subscriber
//! with it before any live event can arrive. Subscribing and publishing
//! are serialized by a single lock, so a subscriber can never miss an
//! event published between its snapshot and its registration, and never
//! sees the retained value twice.
//!
//! Backpressure is deliberately out of scope: a subscriber that falls
//! behind the publisher observes [`Error::BusSaturated`], which the rest
//! of the system treats as fatal.

use parking_lot::Mutex;
use tokenrelay_core::{Error, Result, record::TokenResponse};
use tokio::sync::broadcast;

/// In-process publish/subscribe bus with latest-value replay.
pub struct ReplayBus {
    /// Retained latest value. The lock also serializes `publish` against
    /// `subscribe`, which is what makes the primed snapshot race-free.
    latest: Mutex<TokenResponse>,
    sender: broadcast::Sender<TokenResponse>,
}

impl ReplayBus {
    /// Creates a bus whose retained slot holds the sentinel response.
    ///
    /// `capacity` bounds the per-subscriber event backlog; overrunning it
    /// surfaces as [`Error::BusSaturated`] on the slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            latest: Mutex::new(TokenResponse::sentinel()),
            sender,
        }
    }

    /// Publishes a response to all live subscribers and updates the
    /// retained slot.
    ///
    /// A send with zero subscribers only updates the retained slot; the
    /// event is still visible to the next subscriber via replay.
    pub fn publish(&self, response: TokenResponse) {
        let mut latest = self.latest.lock();
        *latest = response.clone();
        let _ = self.sender.send(response);
    }

    /// Opens a subscription primed with the retained value.
    ///
    /// The subscriber first receives the latest published (or sentinel)
    /// response, then every subsequently published event in publish order.
    pub fn subscribe(&self) -> BusSubscription {
        let latest = self.latest.lock();
        let receiver = self.sender.subscribe();
        BusSubscription {
            primed: Some(latest.clone()),
            receiver,
        }
    }

    /// Number of live subscriptions, primed-but-unread ones included.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// One subscriber's view of the bus.
///
/// Dropping the subscription releases its slot on the bus; waiters do
/// this deterministically on both match and deadline.
pub struct BusSubscription {
    primed: Option<TokenResponse>,
    receiver: broadcast::Receiver<TokenResponse>,
}

impl BusSubscription {
    /// Receives the next response event.
    ///
    /// The first call yields the replayed retained value; later calls
    /// yield live events in publish order.
    ///
    /// # Errors
    ///
    /// - [`Error::BusSaturated`] if this subscriber lagged behind the
    ///   publisher and events were overwritten.
    /// - [`Error::ChannelClosed`] if the bus itself was dropped.
    pub async fn recv(&mut self) -> Result<TokenResponse> {
        if let Some(primed) = self.primed.take() {
            return Ok(primed);
        }
        match self.receiver.recv().await {
            Ok(response) => Ok(response),
            Err(broadcast::error::RecvError::Lagged(skipped)) => Err(Error::BusSaturated {
                context: format!("subscriber lagged behind by {skipped} events"),
            }),
            Err(broadcast::error::RecvError::Closed) => Err(Error::ChannelClosed {
                context: "broadcast bus dropped".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use std::time::UNIX_EPOCH;
    use tokenrelay_core::record::TokenRequest;
    use uuid::Uuid;

    fn issued(user: &str) -> TokenResponse {
        TokenResponse::from_request(&TokenRequest::new(user, "cred")).with_token(
            "TOKEN",
            Duration::from_secs(60),
            UNIX_EPOCH + Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn new_subscriber_is_primed_with_sentinel() {
        let bus = ReplayBus::new(16);
        let mut sub = bus.subscribe();
        let first = sub.recv().await.unwrap();
        assert_eq!(first, TokenResponse::sentinel());
    }

    #[tokio::test]
    async fn late_subscriber_replays_latest_then_live_events() {
        let bus = ReplayBus::new(16);
        let earlier = issued("alice");
        let latest = issued("bob");
        bus.publish(earlier);
        bus.publish(latest.clone());

        let mut sub = bus.subscribe();
        assert_eq!(sub.recv().await.unwrap(), latest);

        let live = issued("carol");
        bus.publish(live.clone());
        assert_eq!(sub.recv().await.unwrap(), live);
    }

    #[tokio::test]
    async fn subscribers_see_events_in_publish_order() {
        let bus = ReplayBus::new(16);
        let mut sub = bus.subscribe();
        assert_eq!(sub.recv().await.unwrap(), TokenResponse::sentinel());

        let first = issued("alice");
        let second = issued("bob");
        bus.publish(first.clone());
        bus.publish(second.clone());
        assert_eq!(sub.recv().await.unwrap(), first);
        assert_eq!(sub.recv().await.unwrap(), second);
    }

    #[tokio::test]
    async fn subscribers_are_independent() {
        let bus = ReplayBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = issued("alice");
        bus.publish(event.clone());

        assert_eq!(a.recv().await.unwrap(), TokenResponse::sentinel());
        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), TokenResponse::sentinel());
        assert_eq!(b.recv().await.unwrap(), event);

        drop(a);
        drop(b);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_observes_saturation() {
        let bus = ReplayBus::new(1);
        let mut sub = bus.subscribe();
        // Consume the primed sentinel so only the broadcast backlog counts.
        assert_eq!(sub.recv().await.unwrap(), TokenResponse::sentinel());

        bus.publish(issued("alice"));
        bus.publish(issued("bob"));

        let err = sub.recv().await.unwrap_err();
        assert!(matches!(err, Error::BusSaturated { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn publish_without_subscribers_still_updates_retained_slot() {
        let bus = ReplayBus::new(16);
        let event = issued("alice");
        assert_ne!(event.correlation_id, Uuid::nil());
        bus.publish(event.clone());

        let mut sub = bus.subscribe();
        assert_eq!(sub.recv().await.unwrap(), event);
    }
}
