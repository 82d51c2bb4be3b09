//! # In-Memory Pub/Sub Broker
//!
//! Process-local broker with per-connection unbounded delivery queues.
//! Every publish reaches every connection subscribed at that moment;
//! nothing is dropped while the connection is open.
//!
//! ## Features
//!
//! - **Independent connections**: `duplicate()` hands out isolated subscriber connections
//! - **Leak visibility**: open connection and per-channel subscriber counts
//! - **Failure injection**: subscriptions can be made to fail for tests

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::{PubSubClient, PubSubError, PubSubMessage, PubSubResult, SubscriptionConnection};

#[derive(Debug, Default)]
struct BrokerState {
    /// channel -> (connection id -> delivery queue)
    channels: RwLock<HashMap<String, HashMap<u64, mpsc::UnboundedSender<PubSubMessage>>>>,
    next_connection_id: AtomicU64,
    open_connections: AtomicUsize,
    published: AtomicU64,
    subscribe_failure: RwLock<Option<String>>,
}

impl BrokerState {
    fn release(&self, connection_id: u64, channels: &HashSet<String>) {
        let mut map = self.channels.write();
        for channel in channels {
            if let Some(subscribers) = map.get_mut(channel) {
                subscribers.remove(&connection_id);
                if subscribers.is_empty() {
                    map.remove(channel);
                }
            }
        }
        drop(map);
        self.open_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Process-local pub/sub broker
///
/// Cloning shares the same broker.
///
/// # Example
///
/// ```rust
/// use zeebe_connect::pubsub::{InMemoryBroker, PubSubClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let broker = InMemoryBroker::new();
/// let mut connection = broker.duplicate().await?;
/// connection.subscribe("orders").await?;
///
/// broker.publish("orders", r#"{"ok":true}"#).await?;
/// let message = connection.next_message().await.unwrap();
/// assert_eq!(message.channel, "orders");
///
/// connection.disconnect().await?;
/// assert_eq!(broker.open_connections(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections duplicated and not yet disconnected (or dropped)
    pub fn open_connections(&self) -> usize {
        self.state.open_connections.load(Ordering::SeqCst)
    }

    /// Connections currently subscribed to `channel`
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.state
            .channels
            .read()
            .get(channel)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Channels with at least one subscriber
    pub fn active_channels(&self) -> Vec<String> {
        self.state.channels.read().keys().cloned().collect()
    }

    /// Total messages published
    pub fn published_count(&self) -> u64 {
        self.state.published.load(Ordering::SeqCst)
    }

    /// Make every subsequent subscribe fail with `message` (`None` restores normal behavior)
    pub fn set_subscribe_failure(&self, message: Option<String>) {
        *self.state.subscribe_failure.write() = message;
    }
}

#[async_trait]
impl PubSubClient for InMemoryBroker {
    async fn duplicate(&self) -> PubSubResult<Box<dyn SubscriptionConnection>> {
        let id = self.state.next_connection_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.state.open_connections.fetch_add(1, Ordering::SeqCst);

        debug!(connection_id = id, "Duplicated in-memory pub/sub connection");

        Ok(Box::new(InMemorySubscription {
            id,
            state: Arc::clone(&self.state),
            channels: HashSet::new(),
            sender,
            receiver,
            connected: true,
        }))
    }

    async fn publish(&self, channel: &str, payload: &str) -> PubSubResult<usize> {
        self.state.published.fetch_add(1, Ordering::SeqCst);

        let map = self.state.channels.read();
        let Some(subscribers) = map.get(channel) else {
            debug!(channel = %channel, "Published with no subscribers");
            return Ok(0);
        };

        let mut delivered = 0;
        for sender in subscribers.values() {
            let message = PubSubMessage {
                channel: channel.to_string(),
                payload: payload.to_string(),
            };
            // Closed only after the receiving side is gone
            if sender.send(message).is_ok() {
                delivered += 1;
            }
        }

        Ok(delivered)
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

/// Dedicated subscriber connection handed out by [`InMemoryBroker`]
///
/// Dropping it without `disconnect()` releases its subscriptions as well.
#[derive(Debug)]
pub struct InMemorySubscription {
    id: u64,
    state: Arc<BrokerState>,
    channels: HashSet<String>,
    sender: mpsc::UnboundedSender<PubSubMessage>,
    receiver: mpsc::UnboundedReceiver<PubSubMessage>,
    connected: bool,
}

#[async_trait]
impl SubscriptionConnection for InMemorySubscription {
    async fn subscribe(&mut self, channel: &str) -> PubSubResult<usize> {
        if !self.connected {
            return Err(PubSubError::Disconnected);
        }
        if let Some(message) = self.state.subscribe_failure.read().clone() {
            return Err(PubSubError::Subscribe {
                channel: channel.to_string(),
                message,
            });
        }

        self.state
            .channels
            .write()
            .entry(channel.to_string())
            .or_default()
            .insert(self.id, self.sender.clone());
        self.channels.insert(channel.to_string());

        Ok(self.channels.len())
    }

    async fn next_message(&mut self) -> Option<PubSubMessage> {
        if !self.connected {
            return None;
        }
        self.receiver.recv().await
    }

    async fn disconnect(&mut self) -> PubSubResult<()> {
        if self.connected {
            self.connected = false;
            self.state.release(self.id, &self.channels);
            self.channels.clear();
            debug!(connection_id = self.id, "Disconnected in-memory pub/sub connection");
        }
        Ok(())
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        if self.connected {
            self.connected = false;
            self.state.release(self.id, &self.channels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_only_subscribed_connections() {
        let broker = InMemoryBroker::new();
        let mut a = broker.duplicate().await.unwrap();
        let mut b = broker.duplicate().await.unwrap();

        assert_eq!(a.subscribe("channel-a").await.unwrap(), 1);
        assert_eq!(b.subscribe("channel-b").await.unwrap(), 1);

        assert_eq!(broker.publish("channel-a", "hello").await.unwrap(), 1);
        let message = a.next_message().await.unwrap();
        assert_eq!(message.payload, "hello");

        let nothing =
            tokio::time::timeout(std::time::Duration::from_millis(20), b.next_message()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_releases_subscriptions() {
        let broker = InMemoryBroker::new();
        let mut connection = broker.duplicate().await.unwrap();
        connection.subscribe("orders").await.unwrap();
        assert_eq!(broker.open_connections(), 1);
        assert_eq!(broker.subscriber_count("orders"), 1);

        connection.disconnect().await.unwrap();
        connection.disconnect().await.unwrap();

        assert_eq!(broker.open_connections(), 0);
        assert_eq!(broker.subscriber_count("orders"), 0);
        assert!(connection.next_message().await.is_none());
        assert!(matches!(
            connection.subscribe("orders").await,
            Err(PubSubError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_drop_releases_subscriptions() {
        let broker = InMemoryBroker::new();
        {
            let mut connection = broker.duplicate().await.unwrap();
            connection.subscribe("orders").await.unwrap();
        }
        assert_eq!(broker.open_connections(), 0);
        assert!(broker.active_channels().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_failure_injection() {
        let broker = InMemoryBroker::new();
        broker.set_subscribe_failure(Some("broker unavailable".to_string()));

        let mut connection = broker.duplicate().await.unwrap();
        let err = connection.subscribe("orders").await.unwrap_err();
        assert!(err.to_string().contains("broker unavailable"));
        assert_eq!(broker.subscriber_count("orders"), 0);
    }

    #[tokio::test]
    async fn test_burst_keeps_every_delivery() {
        let broker = InMemoryBroker::new();
        let mut connection = broker.duplicate().await.unwrap();
        connection.subscribe("orders").await.unwrap();

        for n in 0..1_000 {
            let payload = format!(r#"{{"validationChannel":"elsewhere","n":{n}}}"#);
            assert_eq!(broker.publish("orders", &payload).await.unwrap(), 1);
        }
        assert_eq!(broker.publish("orders", "last").await.unwrap(), 1);
        assert_eq!(broker.published_count(), 1_001);

        for _ in 0..1_000 {
            connection.next_message().await.unwrap();
        }
        assert_eq!(connection.next_message().await.unwrap().payload, "last");
    }
}
