//! # System Constants
//!
//! Well-known names shared by the connection, registry and correlation layers.
//!
//! The channel prefix and the `validationChannel` field name are part of the
//! contract with deployed process definitions: downstream process logic reads
//! the injected channel variable and publishes its completion payload there.

use serde::{Deserialize, Serialize};

/// Connection name used when callers do not supply one
pub const DEFAULT_CONNECTION_NAME: &str = "zeebeConnection";

/// Suffix appended to a connection name to form its client token
pub const CLIENT_TOKEN_SUFFIX: &str = "Client";

/// Prefix of every per-call correlation channel (`<prefix>:<uuid>`)
pub const DEFAULT_CHANNEL_PREFIX: &str = "zeebe:validation";

/// Name of the shared pub/sub client the process client duplicates connections from
pub const DEFAULT_PUBSUB_CLIENT_NAME: &str = "consumer";

/// Default wait for a correlated result, in milliseconds
pub const DEFAULT_CORRELATION_TIMEOUT_MS: u64 = 30_000;

/// Process variable (and completion payload field) carrying the correlation channel
pub const VALIDATION_CHANNEL_FIELD: &str = "validationChannel";

/// Kind of handler declaration recorded in the handler registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Worker,
    Deployment,
}

impl std::fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerKind::Worker => write!(f, "worker"),
            MarkerKind::Deployment => write!(f, "deployment"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_kind_names() {
        assert_eq!(MarkerKind::Worker.to_string(), "worker");
        assert_eq!(MarkerKind::Deployment.to_string(), "deployment");
        assert_eq!(
            serde_json::to_string(&MarkerKind::Deployment).unwrap(),
            "\"deployment\""
        );
    }
}
