//! # Configuration
//!
//! Connection options handed to the workflow-engine client factory, plus the
//! settings for the process client and the startup orchestrator.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use zeebe_connect::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new()
//!     .with_file("config/zeebe.toml")
//!     .load()?;
//!
//! let options = config.module_options();
//! println!("gateway: {}", options.gateway_address);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_CHANNEL_PREFIX, DEFAULT_CORRELATION_TIMEOUT_MS, DEFAULT_PUBSUB_CLIENT_NAME,
};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::{ConfigFileOptionsFactory, ConfigLoader};

/// Default Zeebe gateway endpoint
pub const DEFAULT_GATEWAY_ADDRESS: &str = "localhost:26500";

/// Retry policy handed to the workflow-engine client
///
/// The client owns retries; exhausted retries surface as
/// [`crate::error::ZeebeError::Connectivity`] on the failing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Whether the client retries failed gateway calls
    pub retry: bool,

    /// Maximum number of retries per operation
    #[serde(alias = "maxRetries")]
    pub max_retries: u32,

    /// Upper bound for the backoff between retries, in milliseconds
    #[serde(alias = "maxRetryTimeout")]
    pub max_retry_timeout_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            retry: true,
            max_retries: 50,
            max_retry_timeout_ms: 5_000,
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable retries
    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_retry_timeout(mut self, timeout: Duration) -> Self {
        self.max_retry_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn max_retry_timeout(&self) -> Duration {
        Duration::from_millis(self.max_retry_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.retry && self.max_retry_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "client_options.max_retry_timeout_ms",
                "0",
                "must be positive when retries are enabled",
            ));
        }
        Ok(())
    }
}

/// Options a connection is created from
///
/// Produced either directly (`register_sync`) or by an asynchronous
/// configuration source (`register_async`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeebeModuleOptions {
    #[serde(default, alias = "connectionName")]
    pub connection_name: Option<String>,

    #[serde(alias = "gatewayAddress")]
    pub gateway_address: String,

    #[serde(default, alias = "clientOptions")]
    pub client_options: ClientOptions,
}

impl ZeebeModuleOptions {
    pub fn new(gateway_address: impl Into<String>) -> Self {
        Self {
            connection_name: None,
            gateway_address: gateway_address.into(),
            client_options: ClientOptions::default(),
        }
    }

    pub fn with_connection_name(mut self, connection_name: impl Into<String>) -> Self {
        self.connection_name = Some(connection_name.into());
        self
    }

    pub fn with_client_options(mut self, client_options: ClientOptions) -> Self {
        self.client_options = client_options;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.gateway_address.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "gateway_address",
                "ZeebeModuleOptions",
            ));
        }
        if let Some(name) = &self.connection_name {
            if name.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "connection_name",
                    name.clone(),
                    "connection name cannot be blank",
                ));
            }
        }
        self.client_options.validate()
    }
}

/// Process client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessClientConfig {
    /// Prefix of every correlation channel
    pub channel_prefix: String,

    /// Named pub/sub client that subscription connections are duplicated from
    pub pubsub_client_name: String,

    /// Wait applied by callers that do not pass their own timeout
    pub default_timeout_ms: u64,
}

impl Default for ProcessClientConfig {
    fn default() -> Self {
        Self {
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            pubsub_client_name: DEFAULT_PUBSUB_CLIENT_NAME.to_string(),
            default_timeout_ms: DEFAULT_CORRELATION_TIMEOUT_MS,
        }
    }
}

impl ProcessClientConfig {
    pub fn with_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.channel_prefix = prefix.into();
        self
    }

    pub fn with_pubsub_client_name(mut self, name: impl Into<String>) -> Self {
        self.pubsub_client_name = name.into();
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.channel_prefix.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "channel_prefix",
                "ProcessClientConfig",
            ));
        }
        if self.pubsub_client_name.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "pubsub_client_name",
                "ProcessClientConfig",
            ));
        }
        if self.default_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "default_timeout_ms",
                "0",
                "correlation timeout must be positive",
            ));
        }
        Ok(())
    }
}

/// What the startup orchestrator does when one deployment or worker registration fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupFailurePolicy {
    /// Stop at the first failure and return it
    #[default]
    Abort,
    /// Log the failure, keep registering the remaining handlers, report all failures
    Continue,
}

/// Startup orchestrator settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    pub failure_policy: StartupFailurePolicy,
}

/// Complete file/env configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeebeConfig {
    pub gateway_address: String,
    pub connection_name: Option<String>,
    pub client_options: ClientOptions,
    pub process_client: ProcessClientConfig,
    pub startup: StartupConfig,
}

impl Default for ZeebeConfig {
    fn default() -> Self {
        Self {
            gateway_address: DEFAULT_GATEWAY_ADDRESS.to_string(),
            connection_name: None,
            client_options: ClientOptions::default(),
            process_client: ProcessClientConfig::default(),
            startup: StartupConfig::default(),
        }
    }
}

impl ZeebeConfig {
    /// Connection options described by this configuration
    pub fn module_options(&self) -> ZeebeModuleOptions {
        ZeebeModuleOptions {
            connection_name: self.connection_name.clone(),
            gateway_address: self.gateway_address.clone(),
            client_options: self.client_options.clone(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.module_options().validate()?;
        self.process_client.validate()
    }
}
