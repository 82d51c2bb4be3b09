//! # Workflow Engine Boundary
//!
//! The workflow-engine client is consumed as a black box: it deploys process
//! definitions, starts process instances and runs long-lived task workers.
//! This module defines the operations the adapter relies on and the data
//! exchanged with them.
//!
//! ## Architecture
//!
//! ```text
//! ConnectionManager ──→ ClientFactory::create_client ──→ Arc<dyn WorkflowEngineClient>
//!                                                              │
//!        StartupOrchestrator ── deploy_process / create_worker ┤
//!        ProcessClient ──────── create_process_instance ───────┘
//! ```

pub mod job;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::ClientOptions;
use crate::error::{ZeebeError, ZeebeResult};

pub use job::{handler_fn, JobOutcome, TaskHandler, ZeebeJob};

/// Flat key/value variables at the root of a process instance scope
pub type ProcessVariables = Map<String, Value>;

/// Serialize caller variables and require a JSON object at the root
///
/// `[{"a": 1}]` is rejected: the engine maps variables key by key.
pub fn to_process_variables<V: Serialize + ?Sized>(variables: &V) -> ZeebeResult<ProcessVariables> {
    match serde_json::to_value(variables)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ZeebeError::invalid_variables(format!(
            "root must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Request to start one process instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProcessInstanceRequest {
    pub bpmn_process_id: String,
    pub variables: ProcessVariables,
    /// `None` starts the latest deployed version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

impl CreateProcessInstanceRequest {
    pub fn new(bpmn_process_id: impl Into<String>, variables: ProcessVariables) -> Self {
        Self {
            bpmn_process_id: bpmn_process_id.into(),
            variables,
            version: None,
        }
    }

    pub fn with_version(mut self, version: Option<i32>) -> Self {
        self.version = version;
        self
    }
}

/// Engine acknowledgment of a started process instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProcessInstanceResponse {
    /// Key of the process definition the instance was created from
    pub process_definition_key: String,
    pub bpmn_process_id: String,
    pub version: i32,
    pub process_instance_key: String,
}

/// One process definition deployed from a resource file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetadata {
    pub bpmn_process_id: String,
    pub version: i32,
    pub process_definition_key: String,
    pub resource_name: String,
}

/// Engine acknowledgment of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployProcessResponse {
    pub key: String,
    pub processes: Vec<ProcessMetadata>,
}

/// Worker polling and concurrency tuning, forwarded to the engine as declared
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,

    /// Job activation timeout, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_jobs_to_activate: Option<u32>,

    /// Long-poll duration, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// Restrict the variables fetched with each job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_variables: Option<Vec<String>>,

    /// Engine-specific options passed through untouched
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl WorkerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = Some(name.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_max_jobs_to_activate(mut self, max: u32) -> Self {
        self.max_jobs_to_activate = Some(max);
        self
    }

    pub fn with_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = Some(interval_ms);
        self
    }

    pub fn with_fetch_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch_variables = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Everything the engine needs to start a long-lived worker
#[derive(Clone)]
pub struct WorkerConfig {
    pub task_type: String,
    pub handler: Arc<dyn TaskHandler>,
    pub options: WorkerOptions,
}

impl std::fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("task_type", &self.task_type)
            .field("handler", &"<Arc<dyn TaskHandler>>")
            .field("options", &self.options)
            .finish()
    }
}

/// Operations consumed from the workflow-engine client
///
/// Implementations must be safe for concurrent use: one client per
/// connection name is shared by every outstanding call.
#[async_trait]
pub trait WorkflowEngineClient: Send + Sync + 'static {
    /// Start a process instance
    async fn create_process_instance(
        &self,
        request: CreateProcessInstanceRequest,
    ) -> ZeebeResult<CreateProcessInstanceResponse>;

    /// Deploy the process definition stored at `path`
    async fn deploy_process(&self, path: &Path) -> ZeebeResult<DeployProcessResponse>;

    /// Register a long-lived worker that invokes `config.handler` for each job of its task type
    async fn create_worker(&self, config: WorkerConfig) -> ZeebeResult<()>;

    /// Stop workers and close the gateway connection
    async fn close(&self) -> ZeebeResult<()>;

    /// Gateway this client is bound to
    fn gateway_address(&self) -> &str;
}

impl std::fmt::Debug for dyn WorkflowEngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngineClient")
            .field("gateway_address", &self.gateway_address())
            .finish()
    }
}

/// Constructs clients bound to a gateway
///
/// Construction performs no I/O; connectivity is established lazily by the client.
pub trait ClientFactory: Send + Sync + 'static {
    fn create_client(
        &self,
        gateway_address: &str,
        options: &ClientOptions,
    ) -> ZeebeResult<Arc<dyn WorkflowEngineClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(&str, &ClientOptions) -> ZeebeResult<Arc<dyn WorkflowEngineClient>> + Send + Sync + 'static,
{
    fn create_client(
        &self,
        gateway_address: &str,
        options: &ClientOptions,
    ) -> ZeebeResult<Arc<dyn WorkflowEngineClient>> {
        self(gateway_address, options)
    }
}
