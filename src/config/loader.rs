//! Configuration Loader
//!
//! Merges an optional configuration file (TOML, YAML or JSON, by extension)
//! with prefixed environment variables and validates the result.
//!
//! Environment keys use a double underscore between path segments:
//! `ZEEBE__GATEWAY_ADDRESS`, `ZEEBE__CLIENT_OPTIONS__MAX_RETRIES`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::{ZeebeConfig, ZeebeModuleOptions};
use crate::connection::OptionsFactory;
use crate::error::ZeebeResult;

/// Default environment variable prefix
pub const DEFAULT_ENV_PREFIX: &str = "ZEEBE";

/// Builder for loading [`ZeebeConfig`]
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: Some(DEFAULT_ENV_PREFIX.to_string()),
        }
    }

    /// Read this file before applying environment overrides
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Use a different environment prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Ignore the environment entirely
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Load, merge and validate
    pub fn load(&self) -> ConfigResult<ZeebeConfig> {
        let mut builder = config::Config::builder();

        if let Some(path) = &self.file {
            if !path.is_file() {
                return Err(ConfigurationError::ConfigFileNotFound { path: path.clone() });
            }
            debug!(path = %path.display(), "Loading Zeebe configuration file");
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                config::Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: ZeebeConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            gateway_address = %config.gateway_address,
            connection_name = ?config.connection_name,
            retry = config.client_options.retry,
            "Zeebe configuration loaded"
        );

        Ok(config)
    }
}

/// Options source that reads module options from configuration on demand
///
/// Plugs the file/env loader into `register_async` as its
/// configuration-producing component.
#[derive(Debug, Clone, Default)]
pub struct ConfigFileOptionsFactory {
    loader: ConfigLoader,
}

impl ConfigFileOptionsFactory {
    pub fn new(loader: ConfigLoader) -> Self {
        Self { loader }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self::new(ConfigLoader::new().with_file(path.as_ref()))
    }
}

#[async_trait]
impl OptionsFactory for ConfigFileOptionsFactory {
    async fn create_zeebe_options(&self) -> ZeebeResult<ZeebeModuleOptions> {
        let loader = self.loader.clone();
        let config = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| crate::error::ZeebeError::configuration("ConfigLoader", e.to_string()))??;
        Ok(config.module_options())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StartupFailurePolicy;
    use std::io::Write;

    fn write_config(contents: &str, extension: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(extension)
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml_file() {
        let file = write_config(
            r#"
gateway_address = "zeebe.internal:26500"
connection_name = "orders"

[client_options]
retry = true
max_retries = 5
max_retry_timeout_ms = 2000

[process_client]
channel_prefix = "orders:validation"

[startup]
failure_policy = "continue"
"#,
            ".toml",
        );

        let config = ConfigLoader::new()
            .without_env()
            .with_file(file.path())
            .load()
            .unwrap();

        assert_eq!(config.gateway_address, "zeebe.internal:26500");
        assert_eq!(config.connection_name.as_deref(), Some("orders"));
        assert_eq!(config.client_options.max_retries, 5);
        assert_eq!(config.process_client.channel_prefix, "orders:validation");
        assert_eq!(config.process_client.pubsub_client_name, "consumer");
        assert_eq!(config.startup.failure_policy, StartupFailurePolicy::Continue);
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new()
            .without_env()
            .with_file("/definitely/not/here.toml")
            .load();
        assert!(matches!(
            result,
            Err(ConfigurationError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = write_config(r#"gateway_address = """#, ".toml");
        let result = ConfigLoader::new().without_env().with_file(file.path()).load();
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config(r#"gateway_address = "from-file:26500""#, ".toml");
        std::env::set_var("ZCLOADERTEST__GATEWAY_ADDRESS", "from-env:26500");
        std::env::set_var("ZCLOADERTEST__CLIENT_OPTIONS__MAX_RETRIES", "7");

        let config = ConfigLoader::new()
            .with_env_prefix("ZCLOADERTEST")
            .with_file(file.path())
            .load()
            .unwrap();

        std::env::remove_var("ZCLOADERTEST__GATEWAY_ADDRESS");
        std::env::remove_var("ZCLOADERTEST__CLIENT_OPTIONS__MAX_RETRIES");

        assert_eq!(config.gateway_address, "from-env:26500");
        assert_eq!(config.client_options.max_retries, 7);
    }

    #[tokio::test]
    async fn test_options_factory_reads_file() {
        let file = write_config(
            r#"{ "gateway_address": "json-host:26500", "connection_name": "billing" }"#,
            ".json",
        );
        let factory = ConfigFileOptionsFactory::new(
            ConfigLoader::new().without_env().with_file(file.path()),
        );

        let options = factory.create_zeebe_options().await.unwrap();
        assert_eq!(options.gateway_address, "json-host:26500");
        assert_eq!(options.connection_name.as_deref(), Some("billing"));
    }
}
