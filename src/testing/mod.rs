//! # In-Memory Workflow Engine
//!
//! Test double for [`WorkflowEngineClient`] that records every call, keeps the
//! registered workers by task type and can play the part of process logic by
//! publishing a completion signal to the injected correlation channel.
//!
//! ## Features
//!
//! - **Call log**: ordered [`EngineCall`] records for deploy/worker/start/close
//! - **Failure injection**: start, deploy (per path), worker (per task type), close and connectivity
//! - **Auto-complete**: publishes `{validationChannel, processInstanceKey, ...}` after a delay
//! - **Job execution**: [`InMemoryWorkflowEngine::run_job`] invokes a registered handler
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use zeebe_connect::config::ProcessClientConfig;
//! use zeebe_connect::process_client::{AwaitOptions, ProcessClient};
//! use zeebe_connect::pubsub::InMemoryBroker;
//! use zeebe_connect::testing::InMemoryWorkflowEngine;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = InMemoryBroker::new();
//! let engine = Arc::new(
//!     InMemoryWorkflowEngine::new("localhost:26500")
//!         .with_auto_complete(Arc::new(broker.clone()), Duration::from_millis(50)),
//! );
//! let client = ProcessClient::new(engine, Arc::new(broker), ProcessClientConfig::default());
//!
//! let result = client
//!     .start_process_and_await_result(
//!         "order-process",
//!         &serde_json::json!({"orderId": 7}),
//!         AwaitOptions::new(Duration::from_secs(5)),
//!     )
//!     .await?;
//! assert!(!result.is_timeout());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ClientOptions;
use crate::engine::{
    ClientFactory, CreateProcessInstanceRequest, CreateProcessInstanceResponse,
    DeployProcessResponse, JobOutcome, ProcessMetadata, ProcessVariables, WorkerConfig,
    WorkflowEngineClient, ZeebeJob,
};
use crate::error::{ZeebeError, ZeebeResult};
use crate::process_client::CompletionMessage;
use crate::pubsub::PubSubClient;

const FIRST_KEY: u64 = 2_251_799_813_685_249;

/// One recorded engine call
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Deploy(PathBuf),
    CreateWorker(String),
    CreateProcessInstance(CreateProcessInstanceRequest),
    Close,
}

#[derive(Clone)]
struct AutoComplete {
    publisher: Arc<dyn PubSubClient>,
    delay: Duration,
    result: ProcessVariables,
}

#[derive(Default)]
struct EngineState {
    calls: Vec<EngineCall>,
    workers: HashMap<String, WorkerConfig>,
    start_failure: Option<String>,
    deploy_failures: HashSet<PathBuf>,
    worker_failures: HashSet<String>,
    close_failure: Option<String>,
    unreachable: bool,
    closed: bool,
}

/// Workflow-engine client double
pub struct InMemoryWorkflowEngine {
    gateway_address: String,
    options: ClientOptions,
    state: Mutex<EngineState>,
    next_key: AtomicU64,
    start_delay: Option<Duration>,
    auto_complete: Option<AutoComplete>,
}

impl std::fmt::Debug for InMemoryWorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryWorkflowEngine")
            .field("gateway_address", &self.gateway_address)
            .field("calls", &self.state.lock().calls.len())
            .finish()
    }
}

impl InMemoryWorkflowEngine {
    pub fn new(gateway_address: impl Into<String>) -> Self {
        Self::with_options(gateway_address, ClientOptions::default())
    }

    pub fn with_options(gateway_address: impl Into<String>, options: ClientOptions) -> Self {
        Self {
            gateway_address: gateway_address.into(),
            options,
            state: Mutex::new(EngineState::default()),
            next_key: AtomicU64::new(FIRST_KEY),
            start_delay: None,
            auto_complete: None,
        }
    }

    /// Delay every start acknowledgment
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    /// Publish a completion for every start that carries a correlation channel
    ///
    /// The publish is scheduled `delay` after the start command arrives,
    /// independent of any start delay.
    pub fn with_auto_complete(mut self, publisher: Arc<dyn PubSubClient>, delay: Duration) -> Self {
        self.auto_complete = Some(AutoComplete {
            publisher,
            delay,
            result: ProcessVariables::new(),
        });
        self
    }

    /// Extra result variables merged into auto-completed payloads
    pub fn with_result_variables(mut self, result: ProcessVariables) -> Self {
        if let Some(auto_complete) = self.auto_complete.as_mut() {
            auto_complete.result = result;
        }
        self
    }

    pub fn client_options(&self) -> &ClientOptions {
        &self.options
    }

    /// Make every start fail with `message` (`None` restores normal behavior)
    pub fn fail_process_starts(&self, message: Option<String>) {
        self.state.lock().start_failure = message;
    }

    pub fn fail_deployment(&self, path: impl Into<PathBuf>) {
        self.state.lock().deploy_failures.insert(path.into());
    }

    pub fn fail_worker(&self, task_type: impl Into<String>) {
        self.state.lock().worker_failures.insert(task_type.into());
    }

    pub fn fail_close(&self, message: Option<String>) {
        self.state.lock().close_failure = message;
    }

    /// Fail every operation with a connectivity error
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn created_instances(&self) -> Vec<CreateProcessInstanceRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::CreateProcessInstance(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn deployed_paths(&self) -> Vec<PathBuf> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Deploy(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Task types with a registered worker, sorted
    pub fn worker_task_types(&self) -> Vec<String> {
        let mut task_types: Vec<String> = self.state.lock().workers.keys().cloned().collect();
        task_types.sort();
        task_types
    }

    pub fn worker(&self, task_type: &str) -> Option<WorkerConfig> {
        self.state.lock().workers.get(task_type).cloned()
    }

    pub fn close_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, EngineCall::Close))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Activate one job for `task_type` and run it through the registered handler
    pub async fn run_job(&self, task_type: &str, variables: ProcessVariables) -> ZeebeResult<JobOutcome> {
        let handler = self
            .worker(task_type)
            .ok_or_else(|| ZeebeError::engine("activate_jobs", format!("no worker for task type '{task_type}'")))?
            .handler;

        let key = self.next_key();
        let job = ZeebeJob {
            key: key.to_string(),
            task_type: task_type.to_string(),
            process_instance_key: (key + 1).to_string(),
            bpmn_process_id: "in-memory".to_string(),
            element_id: task_type.to_string(),
            retries: 3,
            custom_headers: Default::default(),
            variables,
        };
        Ok(handler.handle(job).await)
    }

    fn next_key(&self) -> u64 {
        self.next_key.fetch_add(1, Ordering::SeqCst)
    }

    fn check_reachable(&self) -> ZeebeResult<()> {
        if self.state.lock().unreachable {
            return Err(ZeebeError::connectivity(
                &self.gateway_address,
                "gateway unreachable",
            ));
        }
        Ok(())
    }

    fn schedule_completion(&self, request: &CreateProcessInstanceRequest, process_instance_key: &str) {
        let Some(auto_complete) = self.auto_complete.clone() else {
            return;
        };
        let Some(channel) = request
            .variables
            .get(crate::constants::VALIDATION_CHANNEL_FIELD)
            .and_then(Value::as_str)
        else {
            return;
        };

        let mut variables = request.variables.clone();
        variables.remove(crate::constants::VALIDATION_CHANNEL_FIELD);
        variables.extend(auto_complete.result.clone());
        let completion = CompletionMessage::for_channel(channel, process_instance_key, variables);
        let channel = channel.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(auto_complete.delay).await;
            let payload = match completion.to_json() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "Failed to encode completion payload");
                    return;
                }
            };
            if let Err(e) = auto_complete.publisher.publish(&channel, &payload).await {
                warn!(channel = %channel, error = %e, "Failed to publish completion");
            }
        });
    }
}

#[async_trait]
impl WorkflowEngineClient for InMemoryWorkflowEngine {
    async fn create_process_instance(
        &self,
        request: CreateProcessInstanceRequest,
    ) -> ZeebeResult<CreateProcessInstanceResponse> {
        self.check_reachable()?;
        let start_failure = {
            let mut state = self.state.lock();
            state
                .calls
                .push(EngineCall::CreateProcessInstance(request.clone()));
            state.start_failure.clone()
        };

        if let Some(delay) = self.start_delay {
            if start_failure.is_none() {
                let key = self.next_key();
                self.schedule_completion(&request, &key.to_string());
                tokio::time::sleep(delay).await;
                return Ok(self.acknowledge(&request, key));
            }
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = start_failure {
            return Err(ZeebeError::engine("create_process_instance", message));
        }

        let key = self.next_key();
        self.schedule_completion(&request, &key.to_string());
        Ok(self.acknowledge(&request, key))
    }

    async fn deploy_process(&self, path: &Path) -> ZeebeResult<DeployProcessResponse> {
        self.check_reachable()?;
        let failing = {
            let mut state = self.state.lock();
            state.calls.push(EngineCall::Deploy(path.to_path_buf()));
            state.deploy_failures.contains(path)
        };
        if failing {
            return Err(ZeebeError::engine(
                "deploy_process",
                format!("invalid process definition {}", path.display()),
            ));
        }

        let resource_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bpmn_process_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(DeployProcessResponse {
            key: self.next_key().to_string(),
            processes: vec![ProcessMetadata {
                bpmn_process_id,
                version: 1,
                process_definition_key: self.next_key().to_string(),
                resource_name,
            }],
        })
    }

    async fn create_worker(&self, config: WorkerConfig) -> ZeebeResult<()> {
        self.check_reachable()?;
        let mut state = self.state.lock();
        state
            .calls
            .push(EngineCall::CreateWorker(config.task_type.clone()));
        if state.worker_failures.contains(&config.task_type) {
            return Err(ZeebeError::engine(
                "create_worker",
                format!("worker rejected for task type '{}'", config.task_type),
            ));
        }
        debug!(task_type = %config.task_type, "In-memory worker registered");
        state.workers.insert(config.task_type.clone(), config);
        Ok(())
    }

    async fn close(&self) -> ZeebeResult<()> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::Close);
        if let Some(message) = state.close_failure.clone() {
            return Err(ZeebeError::engine("close", message));
        }
        state.closed = true;
        state.workers.clear();
        Ok(())
    }

    fn gateway_address(&self) -> &str {
        &self.gateway_address
    }
}

impl InMemoryWorkflowEngine {
    fn acknowledge(&self, request: &CreateProcessInstanceRequest, key: u64) -> CreateProcessInstanceResponse {
        CreateProcessInstanceResponse {
            process_definition_key: (FIRST_KEY - 1).to_string(),
            bpmn_process_id: request.bpmn_process_id.clone(),
            version: request.version.unwrap_or(1),
            process_instance_key: key.to_string(),
        }
    }
}

/// [`ClientFactory`] that builds [`InMemoryWorkflowEngine`]s and keeps them for inspection
#[derive(Debug, Default)]
pub struct InMemoryClientFactory {
    created: Mutex<Vec<Arc<InMemoryWorkflowEngine>>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make construction fail with a configuration error
    pub fn fail_with(&self, message: Option<String>) {
        *self.failure.lock() = message;
    }

    pub fn created(&self) -> Vec<Arc<InMemoryWorkflowEngine>> {
        self.created.lock().clone()
    }

    pub fn last(&self) -> Option<Arc<InMemoryWorkflowEngine>> {
        self.created.lock().last().cloned()
    }
}

impl ClientFactory for InMemoryClientFactory {
    fn create_client(
        &self,
        gateway_address: &str,
        options: &ClientOptions,
    ) -> ZeebeResult<Arc<dyn WorkflowEngineClient>> {
        if let Some(message) = self.failure.lock().clone() {
            return Err(ZeebeError::configuration("ClientFactory", message));
        }
        let engine = Arc::new(InMemoryWorkflowEngine::with_options(
            gateway_address,
            options.clone(),
        ));
        self.created.lock().push(Arc::clone(&engine));
        Ok(engine)
    }
}
