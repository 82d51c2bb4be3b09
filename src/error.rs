//! # Error Types
//!
//! Structured errors for connection management, handler wiring and result
//! correlation. A correlation timeout is deliberately absent here: it is a
//! normal outcome carried by [`crate::process_client::CorrelationOutcome`].

use thiserror::Error;

/// Errors surfaced by the adapter
#[derive(Error, Debug)]
pub enum ZeebeError {
    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },

    #[error("Connection already registered: {connection_name}")]
    DuplicateConnection { connection_name: String },

    #[error("No client registered for connection: {connection_name}")]
    ConnectionNotFound { connection_name: String },

    #[error("Gateway unreachable: {gateway_address}: {message}")]
    Connectivity {
        gateway_address: String,
        message: String,
    },

    #[error("Engine rejected {operation}: {message}")]
    Engine { operation: String, message: String },

    #[error("Invalid process variables: {reason}")]
    InvalidVariables { reason: String },

    #[error("Subscription failed on channel {channel}: {message}")]
    Subscription { channel: String, message: String },

    #[error("Deployment failed for {owner}/{method} ({path}): {message}")]
    Deployment {
        owner: String,
        method: String,
        path: String,
        message: String,
    },

    #[error("Worker registration failed for {owner}/{method} (task type {task_type}): {message}")]
    WorkerRegistration {
        owner: String,
        method: String,
        task_type: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ZeebeError {
    /// Create a configuration error
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate connection error
    pub fn duplicate_connection(connection_name: impl Into<String>) -> Self {
        Self::DuplicateConnection {
            connection_name: connection_name.into(),
        }
    }

    /// Create a missing connection error
    pub fn connection_not_found(connection_name: impl Into<String>) -> Self {
        Self::ConnectionNotFound {
            connection_name: connection_name.into(),
        }
    }

    /// Create a connectivity error
    pub fn connectivity(gateway_address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connectivity {
            gateway_address: gateway_address.into(),
            message: message.into(),
        }
    }

    /// Create an engine rejection error
    pub fn engine(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an invalid variables error
    pub fn invalid_variables(reason: impl Into<String>) -> Self {
        Self::InvalidVariables {
            reason: reason.into(),
        }
    }

    /// Create a subscription error
    pub fn subscription(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscription {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create a startup deployment error carrying the declaring handler
    pub fn deployment(
        owner: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Deployment {
            owner: owner.into(),
            method: method.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a startup worker registration error carrying the declaring handler
    pub fn worker_registration(
        owner: impl Into<String>,
        method: impl Into<String>,
        task_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::WorkerRegistration {
            owner: owner.into(),
            method: method.into(),
            task_type: task_type.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from the broker subscription rather than the engine
    pub fn is_subscription(&self) -> bool {
        matches!(self, Self::Subscription { .. })
    }

    /// Whether the engine could not be reached (retry policy exhausted)
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }
}

/// Result type for adapter operations
pub type ZeebeResult<T> = std::result::Result<T, ZeebeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ZeebeError::subscription("zeebe:validation:abc", "connection refused");
        assert_eq!(
            err.to_string(),
            "Subscription failed on channel zeebe:validation:abc: connection refused"
        );
        assert!(err.is_subscription());

        let err = ZeebeError::configuration("ZeebeModule", "Invalid ZeebeModule options");
        assert_eq!(
            err.to_string(),
            "Configuration error: ZeebeModule: Invalid ZeebeModule options"
        );
    }

    #[test]
    fn test_serialization_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ZeebeError = parse_err.into();
        assert!(matches!(err, ZeebeError::Serialization(_)));
    }
}
