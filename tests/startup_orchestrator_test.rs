mod common;

use common::variables;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use zeebe_connect::config::{StartupConfig, StartupFailurePolicy, ZeebeConfig};
use zeebe_connect::connection::ConnectionRegistry;
use zeebe_connect::engine::{JobOutcome, WorkerOptions, ZeebeJob};
use zeebe_connect::error::ZeebeError;
use zeebe_connect::module::ZeebeModule;
use zeebe_connect::orchestration::StartupOrchestrator;
use zeebe_connect::registry::{HandlerRegistry, ZeebeHandlers};
use zeebe_connect::testing::{EngineCall, InMemoryClientFactory, InMemoryWorkflowEngine};

struct Inventory {
    reserved: AtomicUsize,
}

impl Inventory {
    async fn reserve(self: Arc<Self>, job: ZeebeJob) -> JobOutcome {
        let quantity = job.variable("quantity").and_then(Value::as_u64).unwrap_or(0) as usize;
        let total = self.reserved.fetch_add(quantity, Ordering::SeqCst) + quantity;
        JobOutcome::complete(variables(json!({"reserved": total})))
    }

    async fn release(self: Arc<Self>, _job: ZeebeJob) -> JobOutcome {
        JobOutcome::bpmn_error("NOTHING_TO_RELEASE", "no reservation held")
    }
}

impl ZeebeHandlers for Inventory {
    fn register_handlers(self: Arc<Self>, registry: &HandlerRegistry) {
        registry.register_deployment::<Self>("deploy", "resources/bpmn", ["inventory.bpmn"]);
        registry.register_worker(
            Arc::clone(&self),
            "reserve",
            "reserve-stock",
            WorkerOptions::new()
                .with_max_jobs_to_activate(10)
                .with_fetch_variables(["quantity"]),
            Inventory::reserve,
        );
        registry.register_worker(
            self,
            "release",
            "release-stock",
            WorkerOptions::default(),
            Inventory::release,
        );
    }
}

struct Shipping;

impl Shipping {
    async fn dispatch(self: Arc<Self>, _job: ZeebeJob) -> JobOutcome {
        JobOutcome::complete_empty()
    }
}

impl ZeebeHandlers for Shipping {
    fn register_handlers(self: Arc<Self>, registry: &HandlerRegistry) {
        registry.register_deployment::<Self>("deploy", "resources/bpmn", ["shipping.bpmn", "returns.bpmn"]);
        registry.register_worker(self, "dispatch", "dispatch-parcel", WorkerOptions::default(), Shipping::dispatch);
    }
}

fn handlers(inventory: Arc<Inventory>) -> Arc<HandlerRegistry> {
    let registry = HandlerRegistry::new();
    registry.register_provider(inventory);
    registry.register_provider(Arc::new(Shipping));
    Arc::new(registry)
}

#[tokio::test]
async fn test_module_init_deploys_then_attaches_bound_workers() {
    let inventory = Arc::new(Inventory {
        reserved: AtomicUsize::new(0),
    });
    let factory = InMemoryClientFactory::new();
    let module = ZeebeModule::for_root(
        Arc::new(ConnectionRegistry::new()),
        &factory,
        &ZeebeConfig::default(),
    )
    .unwrap()
    .with_handlers(handlers(Arc::clone(&inventory)));

    let report = module.on_module_init().await.unwrap().unwrap();
    let engine = factory.last().unwrap();

    assert_eq!(
        engine.calls(),
        vec![
            EngineCall::Deploy(PathBuf::from("resources/bpmn/inventory.bpmn")),
            EngineCall::Deploy(PathBuf::from("resources/bpmn/shipping.bpmn")),
            EngineCall::Deploy(PathBuf::from("resources/bpmn/returns.bpmn")),
            EngineCall::CreateWorker("reserve-stock".to_string()),
            EngineCall::CreateWorker("release-stock".to_string()),
            EngineCall::CreateWorker("dispatch-parcel".to_string()),
        ]
    );
    assert_eq!(report.deployments.len(), 3);
    assert_eq!(report.deployments[1].owner, "Shipping");
    assert_eq!(report.deployments[1].response.processes[0].bpmn_process_id, "shipping");

    let worker = engine.worker("reserve-stock").unwrap();
    assert_eq!(worker.options.max_jobs_to_activate, Some(10));
    assert_eq!(worker.options.fetch_variables, Some(vec!["quantity".to_string()]));

    engine
        .run_job("reserve-stock", variables(json!({"quantity": 4})))
        .await
        .unwrap();
    let outcome = engine
        .run_job("reserve-stock", variables(json!({"quantity": 3})))
        .await
        .unwrap();
    assert_eq!(outcome, JobOutcome::complete(variables(json!({"reserved": 7}))));
    assert_eq!(inventory.reserved.load(Ordering::SeqCst), 7);

    let outcome = engine.run_job("release-stock", variables(json!({}))).await.unwrap();
    assert!(matches!(outcome, JobOutcome::Error { ref code, .. } if code == "NOTHING_TO_RELEASE"));
}

#[tokio::test]
async fn test_worker_failure_reports_owner_and_method() {
    let engine = Arc::new(InMemoryWorkflowEngine::new("localhost:26500"));
    engine.fail_worker("release-stock");

    let orchestrator = StartupOrchestrator::new(engine.clone(), &StartupConfig::default());
    let registry = handlers(Arc::new(Inventory {
        reserved: AtomicUsize::new(0),
    }));
    let err = orchestrator.run(registry.as_ref()).await.unwrap_err();

    match err {
        ZeebeError::WorkerRegistration {
            owner,
            method,
            task_type,
            ..
        } => {
            assert_eq!(owner, "Inventory");
            assert_eq!(method, "release");
            assert_eq!(task_type, "release-stock");
        }
        other => panic!("expected worker registration error, got {other}"),
    }
    assert_eq!(engine.worker_task_types(), vec!["reserve-stock".to_string()]);
}

#[tokio::test]
async fn test_continue_policy_from_config_finishes_sequence() {
    let config = ZeebeConfig {
        startup: StartupConfig {
            failure_policy: StartupFailurePolicy::Continue,
        },
        ..ZeebeConfig::default()
    };
    let factory = InMemoryClientFactory::new();
    let module = ZeebeModule::for_root(Arc::new(ConnectionRegistry::new()), &factory, &config)
        .unwrap()
        .with_handlers(handlers(Arc::new(Inventory {
            reserved: AtomicUsize::new(0),
        })));

    // The engine only exists after registration; inject failures before init
    let engine = factory.last().unwrap();
    engine.fail_deployment("resources/bpmn/inventory.bpmn");
    engine.fail_worker("dispatch-parcel");

    let report = module.on_module_init().await.unwrap().unwrap();

    assert!(!report.is_clean());
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.deployments.len(), 2);
    assert_eq!(report.workers.len(), 2);
    assert!(report.failures[0].to_string().contains("Inventory/deploy"));
}

#[tokio::test]
async fn test_unreachable_gateway_aborts_startup() {
    let factory = InMemoryClientFactory::new();
    let module = ZeebeModule::for_root(
        Arc::new(ConnectionRegistry::new()),
        &factory,
        &ZeebeConfig::default(),
    )
    .unwrap()
    .with_handlers(handlers(Arc::new(Inventory {
        reserved: AtomicUsize::new(0),
    })));
    factory.last().unwrap().set_unreachable(true);

    let err = module.on_module_init().await.unwrap_err();
    assert!(matches!(err, ZeebeError::Deployment { .. }));
    assert!(err.to_string().contains("Gateway unreachable"));
}
