//! Process-scoped store of live workflow-engine clients, keyed by client token.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::engine::WorkflowEngineClient;
use crate::error::{ZeebeError, ZeebeResult};
use crate::token::{client_token, resolve_connection_name};

/// Live clients by connection
///
/// Populated when connections are registered at startup and drained by
/// shutdown. Holds at most one client per connection name.
#[derive(Default)]
pub struct ConnectionRegistry {
    clients: DashMap<String, Arc<dyn WorkflowEngineClient>>,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("tokens", &self.tokens())
            .finish()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a client; fails if the connection already has a live client
    pub fn insert(
        &self,
        connection_name: Option<&str>,
        client: Arc<dyn WorkflowEngineClient>,
    ) -> ZeebeResult<()> {
        let token = client_token(connection_name);
        match self.clients.entry(token.clone()) {
            Entry::Occupied(_) => Err(ZeebeError::duplicate_connection(resolve_connection_name(
                connection_name,
            ))),
            Entry::Vacant(slot) => {
                debug!(
                    token = %token,
                    gateway_address = %client.gateway_address(),
                    "Registered workflow-engine client"
                );
                slot.insert(client);
                Ok(())
            }
        }
    }

    /// Client for a connection (`None` selects the default connection)
    pub fn get(&self, connection_name: Option<&str>) -> Option<Arc<dyn WorkflowEngineClient>> {
        self.clients
            .get(&client_token(connection_name))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Like [`get`](Self::get) but fails when the connection is unknown
    pub fn require(&self, connection_name: Option<&str>) -> ZeebeResult<Arc<dyn WorkflowEngineClient>> {
        self.get(connection_name)
            .ok_or_else(|| ZeebeError::connection_not_found(resolve_connection_name(connection_name)))
    }

    /// Remove and return a connection's client
    pub fn remove(&self, connection_name: Option<&str>) -> Option<Arc<dyn WorkflowEngineClient>> {
        self.clients
            .remove(&client_token(connection_name))
            .map(|(_, client)| client)
    }

    pub fn contains(&self, connection_name: Option<&str>) -> bool {
        self.clients.contains_key(&client_token(connection_name))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.clients.iter().map(|entry| entry.key().clone()).collect()
    }
}
