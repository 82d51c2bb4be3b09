//! # Structured Logging Module
//!
//! Environment-aware structured logging for connection lifecycle, startup
//! wiring and result correlation.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// `RUST_LOG` takes precedence; otherwise the level follows the environment
/// name. Set `ZEEBE_LOG_FORMAT=json` for JSON console output.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = std::env::var("ZEEBE_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let console = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A subscriber installed by the host application wins
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing");
        }

        tracing::info!(
            environment = %environment,
            json = json,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("ZEEBE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log a process definition deployment performed at startup
pub fn log_deployment(owner: &str, method: &str, path: &str, result: &serde_json::Value) {
    tracing::info!(
        owner = %owner,
        method = %method,
        path = %path,
        result = %result,
        timestamp = %Utc::now().to_rfc3339(),
        "Deployed process definition"
    );
}

/// Log a task worker mapped to its handler method
pub fn log_worker_mapping(task_type: &str, owner: &str, method: &str) {
    tracing::info!(
        task_type = %task_type,
        owner = %owner,
        method = %method,
        timestamp = %Utc::now().to_rfc3339(),
        "Mapped task worker"
    );
}

/// Log how a correlated start resolved
pub fn log_correlation(
    bpmn_process_id: &str,
    channel: &str,
    process_instance_key: Option<&str>,
    outcome: &str,
    elapsed_ms: u128,
) {
    tracing::debug!(
        bpmn_process_id = %bpmn_process_id,
        channel = %channel,
        process_instance_key = process_instance_key,
        outcome = %outcome,
        elapsed_ms = elapsed_ms as u64,
        "Correlation resolved"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_by_environment() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("test"), "debug");
    }

    #[test]
    fn test_init_is_repeatable() {
        init_structured_logging();
        init_structured_logging();
    }
}
