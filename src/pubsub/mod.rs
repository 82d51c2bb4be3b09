//! # Pub/Sub Broker Boundary
//!
//! Completion signals for correlated process starts arrive over a
//! publish/subscribe broker. The process client never shares a subscription:
//! every correlated call duplicates its own connection from a named shared
//! client, subscribes it to a channel nobody else uses, and releases it when
//! the call resolves.
//!
//! ## Available Providers
//!
//! - **InMemoryBroker**: process-local broker for tests and single-process setups
//! - **RedisPubSubClient**: Redis/Dragonfly `SUBSCRIBE`/`PUBLISH` (feature `redis`)

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub use in_memory::InMemoryBroker;
#[cfg(feature = "redis")]
pub use self::redis::RedisPubSubClient;

/// Errors raised by broker operations
#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("Pub/sub connection error: {0}")]
    Connection(String),

    #[error("Subscribe to {channel} failed: {message}")]
    Subscribe { channel: String, message: String },

    #[error("Publish to {channel} failed: {message}")]
    Publish { channel: String, message: String },

    #[error("Subscription connection is disconnected")]
    Disconnected,
}

/// Result type for broker operations
pub type PubSubResult<T> = Result<T, PubSubError>;

/// A message delivered on a subscribed channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMessage {
    pub channel: String,
    /// Raw payload, JSON text for completion signals
    pub payload: String,
}

/// Shared broker client that dedicated connections are duplicated from
#[async_trait]
pub trait PubSubClient: Send + Sync + 'static {
    /// Open a new independent connection to the same broker
    async fn duplicate(&self) -> PubSubResult<Box<dyn SubscriptionConnection>>;

    /// Publish a payload, returning the number of receiving subscribers
    async fn publish(&self, channel: &str, payload: &str) -> PubSubResult<usize>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}

/// A dedicated connection in subscriber mode
#[async_trait]
pub trait SubscriptionConnection: Send + 'static {
    /// Subscribe and wait for the broker's acknowledgment
    ///
    /// Returns the number of channels this connection is subscribed to.
    async fn subscribe(&mut self, channel: &str) -> PubSubResult<usize>;

    /// Next message on any subscribed channel
    ///
    /// Cancel-safe: dropping the returned future loses no message. `None`
    /// means the connection closed.
    async fn next_message(&mut self) -> Option<PubSubMessage>;

    /// Drop every subscription and close the connection. Idempotent.
    async fn disconnect(&mut self) -> PubSubResult<()>;
}

/// Named shared broker clients
#[derive(Default)]
pub struct PubSubRegistry {
    clients: DashMap<String, Arc<dyn PubSubClient>>,
}

impl std::fmt::Debug for PubSubRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubRegistry")
            .field("clients", &self.client_names())
            .finish()
    }
}

impl PubSubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under a name, replacing any previous one
    pub fn register(&self, name: impl Into<String>, client: Arc<dyn PubSubClient>) {
        let name = name.into();
        debug!(name = %name, provider = client.provider_name(), "Registered pub/sub client");
        self.clients.insert(name, client);
    }

    /// Look up a client by name
    pub fn get_named_client(&self, name: &str) -> Option<Arc<dyn PubSubClient>> {
        self.clients.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn client_names(&self) -> Vec<String> {
        self.clients.iter().map(|entry| entry.key().clone()).collect()
    }
}
