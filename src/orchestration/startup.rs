//! # Startup Orchestrator
//!
//! Deploys every declared process definition, then attaches every declared
//! worker to the workflow-engine client.
//!
//! Deployments run serially in discovery order, files in declared order, so
//! the gateway sees one deployment at a time and the log reads in order.
//! Workers are registered after all deployments.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{StartupConfig, StartupFailurePolicy};
use crate::engine::{DeployProcessResponse, WorkflowEngineClient};
use crate::error::{ZeebeError, ZeebeResult};
use crate::logging::{log_deployment, log_worker_mapping};
use crate::registry::{DeploymentDeclaration, HandlerDiscovery, HandlerIdentity, WorkerDeclaration};

/// A process definition file deployed at startup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentRecord {
    pub owner: String,
    pub method: String,
    pub path: String,
    pub response: DeployProcessResponse,
}

/// A worker attached at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerRecord {
    pub owner: String,
    pub method: String,
    pub task_type: String,
}

/// What a startup run did
#[derive(Debug, Default)]
pub struct StartupReport {
    pub deployments: Vec<DeploymentRecord>,
    pub workers: Vec<WorkerRecord>,
    /// Failures collected under [`StartupFailurePolicy::Continue`]
    pub failures: Vec<ZeebeError>,
}

impl StartupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs the startup sequence against one client
pub struct StartupOrchestrator {
    client: Arc<dyn WorkflowEngineClient>,
    policy: StartupFailurePolicy,
}

impl std::fmt::Debug for StartupOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartupOrchestrator")
            .field("gateway_address", &self.client.gateway_address())
            .field("policy", &self.policy)
            .finish()
    }
}

impl StartupOrchestrator {
    pub fn new(client: Arc<dyn WorkflowEngineClient>, config: &StartupConfig) -> Self {
        Self {
            client,
            policy: config.failure_policy,
        }
    }

    pub fn with_policy(mut self, policy: StartupFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Deploy everything, then register every worker
    ///
    /// Under `Abort` the first failure is returned and nothing after it runs.
    /// Under `Continue` failures are logged and collected in the report.
    pub async fn run(&self, discovery: &dyn HandlerDiscovery) -> ZeebeResult<StartupReport> {
        let mut report = StartupReport::default();

        let deployments = discovery.deployments();
        info!(count = deployments.len(), "Deploying declared process definitions");
        for deployment in &deployments {
            self.deploy(deployment, &mut report).await?;
        }

        let workers = discovery.workers();
        info!(count = workers.len(), "Registering declared task workers");
        let mut seen = HashSet::new();
        for worker in &workers {
            if !seen.insert(worker.task_type.clone()) {
                warn!(
                    task_type = %worker.task_type,
                    handler = %worker.identity,
                    "Task type declared by more than one handler"
                );
            }
            self.register_worker(worker, &mut report).await?;
        }

        info!(
            deployments = report.deployments.len(),
            workers = report.workers.len(),
            failures = report.failures.len(),
            "Startup sequence finished"
        );
        Ok(report)
    }

    async fn deploy(
        &self,
        deployment: &DeploymentDeclaration,
        report: &mut StartupReport,
    ) -> ZeebeResult<()> {
        let HandlerIdentity { owner, method } = &deployment.identity;

        for path in deployment.resource_paths() {
            let path_text = path.display().to_string();
            match self.client.deploy_process(&path).await {
                Ok(response) => {
                    let result = serde_json::to_value(&response).unwrap_or_default();
                    log_deployment(owner, method, &path_text, &result);
                    report.deployments.push(DeploymentRecord {
                        owner: owner.clone(),
                        method: method.clone(),
                        path: path_text,
                        response,
                    });
                }
                Err(e) => {
                    let failure = ZeebeError::deployment(owner, method, path_text, e.to_string());
                    self.handle_failure(failure, report)?;
                }
            }
        }
        Ok(())
    }

    async fn register_worker(
        &self,
        worker: &WorkerDeclaration,
        report: &mut StartupReport,
    ) -> ZeebeResult<()> {
        let HandlerIdentity { owner, method } = &worker.identity;

        match self.client.create_worker(worker.worker_config()).await {
            Ok(()) => {
                log_worker_mapping(&worker.task_type, owner, method);
                report.workers.push(WorkerRecord {
                    owner: owner.clone(),
                    method: method.clone(),
                    task_type: worker.task_type.clone(),
                });
                Ok(())
            }
            Err(e) => {
                let failure =
                    ZeebeError::worker_registration(owner, method, &worker.task_type, e.to_string());
                self.handle_failure(failure, report)
            }
        }
    }

    fn handle_failure(&self, failure: ZeebeError, report: &mut StartupReport) -> ZeebeResult<()> {
        error!(error = %failure, policy = ?self.policy, "Startup step failed");
        match self.policy {
            StartupFailurePolicy::Abort => Err(failure),
            StartupFailurePolicy::Continue => {
                report.failures.push(failure);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{JobOutcome, WorkerOptions, ZeebeJob};
    use crate::registry::HandlerRegistry;
    use crate::testing::{EngineCall, InMemoryWorkflowEngine};
    use std::path::PathBuf;

    struct Orders;

    impl Orders {
        async fn ship(self: Arc<Self>, _job: ZeebeJob) -> JobOutcome {
            JobOutcome::complete_empty()
        }
    }

    fn registry() -> HandlerRegistry {
        let registry = HandlerRegistry::new();
        let orders = Arc::new(Orders);
        registry.register_worker(
            Arc::clone(&orders),
            "ship",
            "ship-order",
            WorkerOptions::default(),
            Orders::ship,
        );
        registry.register_deployment::<Orders>("deploy", "bpmn", ["order.bpmn", "refund.bpmn"]);
        registry
    }

    #[tokio::test]
    async fn test_deploys_in_order_before_workers() {
        let engine = Arc::new(InMemoryWorkflowEngine::new("localhost:26500"));
        let orchestrator = StartupOrchestrator::new(engine.clone(), &StartupConfig::default());

        let report = orchestrator.run(&registry()).await.unwrap();

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Deploy(PathBuf::from("bpmn/order.bpmn")),
                EngineCall::Deploy(PathBuf::from("bpmn/refund.bpmn")),
                EngineCall::CreateWorker("ship-order".to_string()),
            ]
        );
        assert!(report.is_clean());
        assert_eq!(report.deployments.len(), 2);
        assert_eq!(report.deployments[0].owner, "Orders");
        assert_eq!(
            report.workers,
            vec![WorkerRecord {
                owner: "Orders".to_string(),
                method: "ship".to_string(),
                task_type: "ship-order".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_abort_stops_at_first_failure() {
        let engine = Arc::new(InMemoryWorkflowEngine::new("localhost:26500"));
        engine.fail_deployment("bpmn/order.bpmn");
        let orchestrator = StartupOrchestrator::new(engine.clone(), &StartupConfig::default());

        let err = orchestrator.run(&registry()).await.unwrap_err();
        match err {
            ZeebeError::Deployment { owner, method, path, .. } => {
                assert_eq!(owner, "Orders");
                assert_eq!(method, "deploy");
                assert_eq!(path, "bpmn/order.bpmn");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.calls().len(), 1);
        assert!(engine.worker_task_types().is_empty());
    }

    #[tokio::test]
    async fn test_continue_collects_failures() {
        let engine = Arc::new(InMemoryWorkflowEngine::new("localhost:26500"));
        engine.fail_deployment("bpmn/order.bpmn");
        engine.fail_worker("ship-order");
        let orchestrator = StartupOrchestrator::new(engine.clone(), &StartupConfig::default())
            .with_policy(StartupFailurePolicy::Continue);

        let report = orchestrator.run(&registry()).await.unwrap();

        assert_eq!(report.deployments.len(), 1);
        assert_eq!(report.deployments[0].path, "bpmn/refund.bpmn");
        assert!(report.workers.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(
            report.failures[1],
            ZeebeError::WorkerRegistration { ref task_type, .. } if task_type == "ship-order"
        ));
    }
}
