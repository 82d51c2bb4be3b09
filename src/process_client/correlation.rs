//! Per-call correlation state and the completion/timeout payload shapes.
//!
//! The completion payload published by process logic is a JSON object
//! `{"validationChannel": <channel>, "processInstanceKey": <key>, ...result}`.
//! Only a payload whose `validationChannel` equals the call's channel resolves it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::constants::VALIDATION_CHANNEL_FIELD;
use crate::engine::{CreateProcessInstanceResponse, ProcessVariables};
use crate::error::ZeebeResult;
use crate::pubsub::PubSubMessage;

/// Channel a correlation id is routed over
pub fn correlation_channel(prefix: &str, correlation_id: &Uuid) -> String {
    format!("{prefix}:{correlation_id}")
}

/// Inject the correlation channel into caller variables
///
/// The channel wins over a caller-supplied `validationChannel`.
pub fn merge_channel_variable(mut variables: ProcessVariables, channel: &str) -> ProcessVariables {
    variables.insert(
        VALIDATION_CHANNEL_FIELD.to_string(),
        Value::String(channel.to_string()),
    );
    variables
}

/// Completion signal published by process logic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMessage {
    pub validation_channel: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_instance_key: Option<Value>,

    /// Result variables, every other field of the payload
    #[serde(flatten)]
    pub variables: ProcessVariables,
}

impl CompletionMessage {
    /// Build the payload process logic publishes for a channel
    pub fn for_channel(
        channel: impl Into<String>,
        process_instance_key: impl Into<String>,
        variables: ProcessVariables,
    ) -> Self {
        Self {
            validation_channel: channel.into(),
            process_instance_key: Some(Value::String(process_instance_key.into())),
            variables,
        }
    }

    pub fn parse(payload: &str) -> ZeebeResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    pub fn to_json(&self) -> ZeebeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The process instance key as text, whether published as a string or a number
    pub fn process_instance_key_str(&self) -> Option<String> {
        match self.process_instance_key.as_ref()? {
            Value::String(key) => Some(key.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Result returned in place of a completion when the wait runs out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutResult {
    /// Start acknowledgment captured before the deadline, if any
    pub process: Option<CreateProcessInstanceResponse>,
    /// Always `true`
    pub timeout: bool,
    pub message: String,
    /// Caller-supplied sentinel
    pub timeout_value: Value,
}

/// What a correlated call resolved with
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CorrelationOutcome {
    Completed(CompletionMessage),
    TimedOut(TimeoutResult),
}

impl CorrelationOutcome {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CorrelationOutcome::TimedOut(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            CorrelationOutcome::Completed(_) => "completed",
            CorrelationOutcome::TimedOut(_) => "timed_out",
        }
    }
}

/// State owned by one `start_process_and_await_result` call
#[derive(Debug, Clone)]
pub struct CorrelationContext {
    pub correlation_id: Uuid,
    pub channel: String,
    /// Filled once the start command resolves
    pub started: Option<CreateProcessInstanceResponse>,
    pub(crate) opened_at: Instant,
}

impl CorrelationContext {
    /// Fresh context with a new correlation id
    pub fn new(channel_prefix: &str) -> Self {
        let correlation_id = Uuid::new_v4();
        Self {
            channel: correlation_channel(channel_prefix, &correlation_id),
            correlation_id,
            started: None,
            opened_at: Instant::now(),
        }
    }

    /// The completion this message carries for our channel, if any
    ///
    /// Unparseable payloads and payloads addressed to another channel are
    /// ignored so later matching messages still resolve the call.
    pub fn accept(&self, message: &PubSubMessage) -> Option<CompletionMessage> {
        match CompletionMessage::parse(&message.payload) {
            Ok(completion) if completion.validation_channel == self.channel => {
                debug!(
                    channel = %self.channel,
                    process_instance_key = ?completion.process_instance_key,
                    "Result received from process instance"
                );
                Some(completion)
            }
            Ok(completion) => {
                debug!(
                    channel = %self.channel,
                    addressed_to = %completion.validation_channel,
                    "Ignoring result addressed to another channel"
                );
                None
            }
            Err(e) => {
                warn!(
                    channel = %message.channel,
                    error = %e,
                    "Ignoring unparseable message on correlation channel"
                );
                None
            }
        }
    }

    /// Timeout result carrying whatever acknowledgment was captured so far
    pub fn timeout_outcome(&self, timeout_value: &Value) -> CorrelationOutcome {
        CorrelationOutcome::TimedOut(TimeoutResult {
            process: self.started.clone(),
            timeout: true,
            message: format!("No result received from {}", self.channel),
            timeout_value: timeout_value.clone(),
        })
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.opened_at.elapsed().as_millis()
    }
}
