//! Engine doubles for integration tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use zeebe_connect::engine::{
    CreateProcessInstanceRequest, CreateProcessInstanceResponse, DeployProcessResponse,
    WorkerConfig, WorkflowEngineClient,
};
use zeebe_connect::error::ZeebeResult;
use zeebe_connect::process_client::CompletionMessage;
use zeebe_connect::pubsub::{InMemoryBroker, PubSubClient};
use zeebe_connect::testing::InMemoryWorkflowEngine;

/// Records whether the correlation channel had a subscriber when the start command arrived
pub struct OrderCheckingEngine {
    inner: InMemoryWorkflowEngine,
    broker: InMemoryBroker,
    observed: Mutex<Vec<(String, usize)>>,
}

impl OrderCheckingEngine {
    pub fn new(inner: InMemoryWorkflowEngine, broker: InMemoryBroker) -> Self {
        Self {
            inner,
            broker,
            observed: Mutex::new(Vec::new()),
        }
    }

    /// `(channel, subscriber count)` seen by each start command
    pub fn observed(&self) -> Vec<(String, usize)> {
        self.observed.lock().clone()
    }
}

#[async_trait]
impl WorkflowEngineClient for OrderCheckingEngine {
    async fn create_process_instance(
        &self,
        request: CreateProcessInstanceRequest,
    ) -> ZeebeResult<CreateProcessInstanceResponse> {
        if let Some(channel) = request
            .variables
            .get("validationChannel")
            .and_then(Value::as_str)
        {
            let subscribers = self.broker.subscriber_count(channel);
            self.observed.lock().push((channel.to_string(), subscribers));
        }
        self.inner.create_process_instance(request).await
    }

    async fn deploy_process(&self, path: &Path) -> ZeebeResult<DeployProcessResponse> {
        self.inner.deploy_process(path).await
    }

    async fn create_worker(&self, config: WorkerConfig) -> ZeebeResult<()> {
        self.inner.create_worker(config).await
    }

    async fn close(&self) -> ZeebeResult<()> {
        self.inner.close().await
    }

    fn gateway_address(&self) -> &str {
        self.inner.gateway_address()
    }
}

/// Completes every instance after the `delayMs` it was started with, echoing its variables
pub struct EchoProcessEngine {
    broker: InMemoryBroker,
    next_key: AtomicU64,
}

impl EchoProcessEngine {
    pub fn new(broker: InMemoryBroker) -> Self {
        Self {
            broker,
            next_key: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl WorkflowEngineClient for EchoProcessEngine {
    async fn create_process_instance(
        &self,
        request: CreateProcessInstanceRequest,
    ) -> ZeebeResult<CreateProcessInstanceResponse> {
        let key = self.next_key.fetch_add(1, Ordering::SeqCst).to_string();
        let delay = request
            .variables
            .get("delayMs")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        if let Some(channel) = request
            .variables
            .get("validationChannel")
            .and_then(Value::as_str)
            .map(str::to_string)
        {
            let mut result = request.variables.clone();
            result.remove("validationChannel");
            let completion = CompletionMessage::for_channel(channel.clone(), key.clone(), result);
            let broker = self.broker.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                let payload = completion.to_json().unwrap();
                broker.publish(&channel, &payload).await.unwrap();
            });
        }

        Ok(CreateProcessInstanceResponse {
            process_definition_key: "1".to_string(),
            bpmn_process_id: request.bpmn_process_id,
            version: request.version.unwrap_or(1),
            process_instance_key: key,
        })
    }

    async fn deploy_process(&self, _path: &Path) -> ZeebeResult<DeployProcessResponse> {
        Ok(DeployProcessResponse {
            key: "1".to_string(),
            processes: Vec::new(),
        })
    }

    async fn create_worker(&self, _config: WorkerConfig) -> ZeebeResult<()> {
        Ok(())
    }

    async fn close(&self) -> ZeebeResult<()> {
        Ok(())
    }

    fn gateway_address(&self) -> &str {
        "echo:26500"
    }
}

/// Shared engine/broker pair with an auto-completing engine
pub fn auto_completing(delay: Duration) -> (Arc<InMemoryWorkflowEngine>, InMemoryBroker) {
    let broker = InMemoryBroker::new();
    let engine = Arc::new(
        InMemoryWorkflowEngine::new("localhost:26500")
            .with_auto_complete(Arc::new(broker.clone()), delay),
    );
    (engine, broker)
}
