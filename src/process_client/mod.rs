//! # Process Client
//!
//! Starts process instances and, optionally, waits for a completion signal
//! that process logic publishes on a per-call pub/sub channel.
//!
//! ## Correlation protocol
//!
//! ```text
//! start_process_and_await_result
//!   ├─ new correlation id ──→ channel "<prefix>:<uuid>"
//!   ├─ duplicate() dedicated connection, subscribe(channel), await ack
//!   ├─ create_process_instance(variables + validationChannel)
//!   ├─ first of:  matching message │ deadline │ subscription/start failure
//!   └─ disconnect() on every path, deadline timer dropped
//! ```
//!
//! Subscribing strictly before the start command means a completion
//! published immediately by the process cannot be missed. Each call owns its
//! channel and connection, so concurrent calls are isolated without locks.
//!
//! ## Failure policy
//!
//! - Subscription failure rejects before the start command is issued.
//! - Start command failure rejects immediately; the pending wait is abandoned.
//! - A completion that beats the start acknowledgment is kept; the
//!   acknowledgment is awaited only until the original deadline.
//! - The deadline elapsing is a successful [`CorrelationOutcome::TimedOut`].

pub mod correlation;
pub mod stats;

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::config::ProcessClientConfig;
use crate::engine::{
    to_process_variables, CreateProcessInstanceRequest, CreateProcessInstanceResponse,
    ProcessVariables, WorkflowEngineClient,
};
use crate::error::{ZeebeError, ZeebeResult};
use crate::logging::log_correlation;
use crate::pubsub::{PubSubClient, PubSubRegistry, SubscriptionConnection};

pub use correlation::{
    correlation_channel, merge_channel_variable, CompletionMessage, CorrelationContext,
    CorrelationOutcome, TimeoutResult,
};
pub use stats::{CorrelationStats, CorrelationStatsSnapshot};

/// Per-call options for a correlated start
#[derive(Debug, Clone, PartialEq)]
pub struct AwaitOptions {
    /// `None` starts the latest deployed version
    pub version: Option<i32>,
    /// Upper bound on the whole call, subscription included
    pub timeout: Duration,
    /// Sentinel returned in the timeout result
    pub timeout_value: Value,
}

impl AwaitOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            version: None,
            timeout,
            timeout_value: Value::Null,
        }
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_timeout_value(mut self, timeout_value: Value) -> Self {
        self.timeout_value = timeout_value;
        self
    }
}

/// Merged view of a correlated start
///
/// Serializes as the start acknowledgment's fields plus `variables`, which
/// holds either the completion payload or the timeout result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessInstanceResult {
    #[serde(flatten)]
    pub process: Option<CreateProcessInstanceResponse>,
    pub variables: CorrelationOutcome,
}

impl ProcessInstanceResult {
    pub fn is_timeout(&self) -> bool {
        self.variables.is_timeout()
    }

    /// The completion payload, unless the call timed out
    pub fn completion(&self) -> Option<&CompletionMessage> {
        match &self.variables {
            CorrelationOutcome::Completed(completion) => Some(completion),
            CorrelationOutcome::TimedOut(_) => None,
        }
    }

    /// The caller's sentinel, if the call timed out
    pub fn timeout_value(&self) -> Option<&Value> {
        match &self.variables {
            CorrelationOutcome::TimedOut(result) => Some(&result.timeout_value),
            CorrelationOutcome::Completed(_) => None,
        }
    }
}

/// Client for starting process instances with optional result correlation
#[derive(Clone)]
pub struct ProcessClient {
    engine: Arc<dyn WorkflowEngineClient>,
    subscriber: Arc<dyn PubSubClient>,
    config: ProcessClientConfig,
    stats: Arc<CorrelationStats>,
}

impl std::fmt::Debug for ProcessClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessClient")
            .field("gateway_address", &self.engine.gateway_address())
            .field("subscriber", &self.subscriber.provider_name())
            .field("config", &self.config)
            .finish()
    }
}

impl ProcessClient {
    pub fn new(
        engine: Arc<dyn WorkflowEngineClient>,
        subscriber: Arc<dyn PubSubClient>,
        config: ProcessClientConfig,
    ) -> Self {
        Self {
            engine,
            subscriber,
            config,
            stats: Arc::new(CorrelationStats::default()),
        }
    }

    /// Build with the shared subscriber named in `config.pubsub_client_name`
    pub fn from_registry(
        engine: Arc<dyn WorkflowEngineClient>,
        pubsub: &PubSubRegistry,
        config: ProcessClientConfig,
    ) -> ZeebeResult<Self> {
        config.validate()?;
        let subscriber = pubsub
            .get_named_client(&config.pubsub_client_name)
            .ok_or_else(|| {
                ZeebeError::configuration(
                    "ProcessClient",
                    format!("no pub/sub client named '{}'", config.pubsub_client_name),
                )
            })?;
        Ok(Self::new(engine, subscriber, config))
    }

    pub fn config(&self) -> &ProcessClientConfig {
        &self.config
    }

    /// Await options using the configured default timeout and a null sentinel
    pub fn await_options(&self) -> AwaitOptions {
        AwaitOptions::new(self.config.default_timeout())
    }

    pub fn stats(&self) -> CorrelationStatsSnapshot {
        self.stats.snapshot()
    }

    /// Start a process instance and return the engine's acknowledgment
    #[instrument(skip_all, fields(bpmn_process_id = %bpmn_process_id))]
    pub async fn start_process<V>(
        &self,
        bpmn_process_id: &str,
        variables: &V,
        version: Option<i32>,
    ) -> ZeebeResult<CreateProcessInstanceResponse>
    where
        V: Serialize + ?Sized,
    {
        let variables = to_process_variables(variables)?;
        let request =
            CreateProcessInstanceRequest::new(bpmn_process_id, variables).with_version(version);

        let response = self.engine.create_process_instance(request).await?;
        debug!(
            process_instance_key = %response.process_instance_key,
            version = response.version,
            "Process instance started"
        );
        Ok(response)
    }

    /// Start a process instance and wait for its published result
    ///
    /// Resolves exactly once: with the matching completion, or with a timeout
    /// result carrying `options.timeout_value`. The dedicated subscription
    /// connection is released on every path.
    #[instrument(skip_all, fields(bpmn_process_id = %bpmn_process_id))]
    pub async fn start_process_and_await_result<V>(
        &self,
        bpmn_process_id: &str,
        variables: &V,
        options: AwaitOptions,
    ) -> ZeebeResult<ProcessInstanceResult>
    where
        V: Serialize + ?Sized,
    {
        let variables = to_process_variables(variables)?;
        let deadline = deadline_after(options.timeout);
        let mut context = CorrelationContext::new(&self.config.channel_prefix);
        let _active = self.stats.begin();

        let mut connection =
            match tokio::time::timeout_at(deadline, self.subscriber.duplicate()).await {
                Ok(Ok(connection)) => connection,
                Ok(Err(e)) => {
                    self.stats.record_failed();
                    return Err(ZeebeError::subscription(&context.channel, e.to_string()));
                }
                Err(_) => {
                    debug!(
                        channel = %context.channel,
                        "Deadline elapsed while opening the correlation connection"
                    );
                    let outcome = context.timeout_outcome(&options.timeout_value);
                    return Ok(self.finish(bpmn_process_id, context, outcome));
                }
            };

        let outcome = self
            .correlate(
                connection.as_mut(),
                &mut context,
                bpmn_process_id,
                variables,
                &options,
                deadline,
            )
            .await;

        if let Err(e) = connection.disconnect().await {
            warn!(channel = %context.channel, error = %e, "Failed to disconnect correlation connection");
        }
        drop(connection);

        match outcome {
            Ok(outcome) => Ok(self.finish(bpmn_process_id, context, outcome)),
            Err(e) => {
                self.stats.record_failed();
                debug!(channel = %context.channel, error = %e, "Correlated start failed");
                Err(e)
            }
        }
    }

    fn finish(
        &self,
        bpmn_process_id: &str,
        context: CorrelationContext,
        outcome: CorrelationOutcome,
    ) -> ProcessInstanceResult {
        self.stats.record_outcome(&outcome);
        log_correlation(
            bpmn_process_id,
            &context.channel,
            context
                .started
                .as_ref()
                .map(|ack| ack.process_instance_key.as_str()),
            outcome.label(),
            context.elapsed_ms(),
        );

        ProcessInstanceResult {
            process: context.started,
            variables: outcome,
        }
    }

    async fn correlate(
        &self,
        connection: &mut dyn SubscriptionConnection,
        context: &mut CorrelationContext,
        bpmn_process_id: &str,
        variables: ProcessVariables,
        options: &AwaitOptions,
        deadline: Instant,
    ) -> ZeebeResult<CorrelationOutcome> {
        let timer = tokio::time::sleep_until(deadline);
        tokio::pin!(timer);

        let subscribed = tokio::select! {
            result = connection.subscribe(&context.channel) => result,
            () = &mut timer => return Ok(context.timeout_outcome(&options.timeout_value)),
        };
        let count = subscribed.map_err(|e| ZeebeError::subscription(&context.channel, e.to_string()))?;
        debug!(
            channel = %context.channel,
            subscribed_channels = count,
            "Subscribed to correlation channel"
        );

        let request = CreateProcessInstanceRequest::new(
            bpmn_process_id,
            merge_channel_variable(variables, &context.channel),
        )
        .with_version(options.version);
        let start = self.engine.create_process_instance(request);
        tokio::pin!(start);
        let mut start_pending = true;

        loop {
            tokio::select! {
                result = &mut start, if start_pending => {
                    start_pending = false;
                    let ack = result?;
                    debug!(
                        channel = %context.channel,
                        process_instance_key = %ack.process_instance_key,
                        "Process instance started, awaiting result"
                    );
                    context.started = Some(ack);
                }
                message = connection.next_message() => {
                    let Some(message) = message else {
                        return Err(ZeebeError::subscription(
                            &context.channel,
                            "subscription closed before a result arrived",
                        ));
                    };
                    let Some(completion) = context.accept(&message) else {
                        continue;
                    };
                    if start_pending {
                        match tokio::time::timeout_at(deadline, &mut start).await {
                            Ok(result) => context.started = Some(result?),
                            Err(_) => debug!(
                                channel = %context.channel,
                                "Result arrived but start acknowledgment did not before the deadline"
                            ),
                        }
                    }
                    return Ok(CorrelationOutcome::Completed(completion));
                }
                () = &mut timer => {
                    return Ok(context.timeout_outcome(&options.timeout_value));
                }
            }
        }
    }
}

/// Deadline for a call, saturating for timeouts past the clock's range
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

/// Roughly thirty years, the same horizon tokio uses for an unbounded sleep
const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;
