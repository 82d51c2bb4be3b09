//! # Handler Registry
//!
//! Explicit registration of worker and deployment handlers at composition
//! time. Components register their own methods through [`ZeebeHandlers`];
//! the startup orchestrator reads the declarations back through
//! [`HandlerDiscovery`].
//!
//! Declarations are pure metadata. Nothing is validated here: duplicate task
//! types across components are reported at startup, not at registration.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use zeebe_connect::engine::{JobOutcome, WorkerOptions, ZeebeJob};
//! use zeebe_connect::registry::{HandlerDiscovery, HandlerRegistry, ZeebeHandlers};
//!
//! struct Billing {
//!     currency: String,
//! }
//!
//! impl Billing {
//!     async fn charge(self: Arc<Self>, _job: ZeebeJob) -> JobOutcome {
//!         let _ = &self.currency;
//!         JobOutcome::complete_empty()
//!     }
//! }
//!
//! impl ZeebeHandlers for Billing {
//!     fn register_handlers(self: Arc<Self>, registry: &HandlerRegistry) {
//!         registry.register_deployment::<Self>("deploy", "bpmn", ["billing.bpmn"]);
//!         registry.register_worker(self, "charge", "charge-card", WorkerOptions::default(), Billing::charge);
//!     }
//! }
//!
//! let registry = HandlerRegistry::new();
//! registry.register_provider(Arc::new(Billing { currency: "EUR".into() }));
//! assert_eq!(registry.workers().len(), 1);
//! assert_eq!(registry.deployments().len(), 1);
//! ```

use parking_lot::RwLock;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::declaration::{
    DeploymentDeclaration, HandlerDeclaration, HandlerIdentity, WorkerDeclaration,
};
use crate::constants::MarkerKind;
use crate::engine::{handler_fn, JobOutcome, WorkerOptions, ZeebeJob};

/// Read side of the registry, consumed by the startup orchestrator
pub trait HandlerDiscovery: Send + Sync {
    /// Every declaration carrying the given marker, in registration order
    fn declarations_with_marker(&self, kind: MarkerKind) -> Vec<HandlerDeclaration>;

    fn deployments(&self) -> Vec<DeploymentDeclaration> {
        self.declarations_with_marker(MarkerKind::Deployment)
            .into_iter()
            .filter_map(|declaration| match declaration {
                HandlerDeclaration::Deployment(deployment) => Some(deployment),
                HandlerDeclaration::Worker(_) => None,
            })
            .collect()
    }

    fn workers(&self) -> Vec<WorkerDeclaration> {
        self.declarations_with_marker(MarkerKind::Worker)
            .into_iter()
            .filter_map(|declaration| match declaration {
                HandlerDeclaration::Worker(worker) => Some(worker),
                HandlerDeclaration::Deployment(_) => None,
            })
            .collect()
    }
}

/// Implemented by application components that declare handlers
pub trait ZeebeHandlers: Send + Sync + 'static {
    fn register_handlers(self: Arc<Self>, registry: &HandlerRegistry);
}

/// In-process store of handler declarations
#[derive(Default)]
pub struct HandlerRegistry {
    declarations: RwLock<Vec<HandlerDeclaration>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("declarations", &self.len())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `f` as the handler for `task_type`, bound to `instance`
    ///
    /// The owner recorded for diagnostics is the short type name of `T`.
    pub fn register_worker<T, F, Fut>(
        &self,
        instance: Arc<T>,
        method: &str,
        task_type: &str,
        options: WorkerOptions,
        f: F,
    ) where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>, ZeebeJob) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        let identity = HandlerIdentity::of::<T>(method);
        let handler = handler_fn(move |job| f(Arc::clone(&instance), job));

        debug!(task_type = %task_type, handler = %identity, "Worker handler declared");
        self.push(HandlerDeclaration::Worker(WorkerDeclaration {
            task_type: task_type.to_string(),
            options,
            handler,
            identity,
        }));
    }

    /// Declare process definition files owned by a method of `T`
    pub fn register_deployment<T: ?Sized>(
        &self,
        method: &str,
        base_path: impl Into<PathBuf>,
        processes: impl IntoIterator<Item = impl Into<String>>,
    ) {
        let declaration = DeploymentDeclaration {
            base_path: base_path.into(),
            processes: processes.into_iter().map(Into::into).collect(),
            identity: HandlerIdentity::of::<T>(method),
        };

        debug!(
            base_path = %declaration.base_path.display(),
            processes = ?declaration.processes,
            handler = %declaration.identity,
            "Deployment declared"
        );
        self.push(HandlerDeclaration::Deployment(declaration));
    }

    /// Add a prebuilt declaration
    pub fn register(&self, declaration: HandlerDeclaration) {
        self.push(declaration);
    }

    /// Let a component register all of its handlers
    pub fn register_provider<H: ZeebeHandlers>(&self, provider: Arc<H>) {
        provider.register_handlers(self);
    }

    pub fn len(&self) -> usize {
        self.declarations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.read().is_empty()
    }

    fn push(&self, declaration: HandlerDeclaration) {
        self.declarations.write().push(declaration);
    }
}

impl HandlerDiscovery for HandlerRegistry {
    fn declarations_with_marker(&self, kind: MarkerKind) -> Vec<HandlerDeclaration> {
        self.declarations
            .read()
            .iter()
            .filter(|declaration| declaration.kind() == kind)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scoring {
        multiplier: i64,
        calls: AtomicUsize,
    }

    impl Scoring {
        async fn score(self: Arc<Self>, job: ZeebeJob) -> JobOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let amount = job.variable("amount").and_then(Value::as_i64).unwrap_or(0);
            JobOutcome::complete(
                json!({"score": amount * self.multiplier})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            )
        }
    }

    impl ZeebeHandlers for Scoring {
        fn register_handlers(self: Arc<Self>, registry: &HandlerRegistry) {
            registry.register_deployment::<Self>("deploy", "bpmn", ["scoring.bpmn", "review.bpmn"]);
            registry.register_worker(
                self,
                "score",
                "score-application",
                WorkerOptions::new().with_max_jobs_to_activate(5),
                Scoring::score,
            );
        }
    }

    fn job(amount: i64) -> ZeebeJob {
        serde_json::from_value(json!({
            "key": "1",
            "type": "score-application",
            "processInstanceKey": "2",
            "bpmnProcessId": "scoring",
            "elementId": "score",
            "retries": 3,
            "variables": {"amount": amount}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_worker_is_bound_to_instance() {
        let scoring = Arc::new(Scoring {
            multiplier: 3,
            calls: AtomicUsize::new(0),
        });
        let registry = HandlerRegistry::new();
        registry.register_provider(Arc::clone(&scoring));

        let workers = registry.workers();
        assert_eq!(workers.len(), 1);
        let worker = &workers[0];
        assert_eq!(worker.task_type, "score-application");
        assert_eq!(worker.identity.to_string(), "Scoring.score");
        assert_eq!(worker.options.max_jobs_to_activate, Some(5));

        let outcome = worker.handler.handle(job(7)).await;
        assert_eq!(
            outcome,
            JobOutcome::complete(json!({"score": 21}).as_object().cloned().unwrap())
        );
        assert_eq!(scoring.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_declarations_filtered_by_marker() {
        let registry = HandlerRegistry::new();
        registry.register_provider(Arc::new(Scoring {
            multiplier: 1,
            calls: AtomicUsize::new(0),
        }));
        registry.register_deployment::<Scoring>("deploy_more", "other", ["extra.bpmn"]);

        let deployments = registry.deployments();
        assert_eq!(deployments.len(), 2);
        assert_eq!(deployments[0].processes, vec!["scoring.bpmn", "review.bpmn"]);
        assert_eq!(deployments[1].identity.method, "deploy_more");
        assert_eq!(
            registry.declarations_with_marker(MarkerKind::Worker).len(),
            1
        );
        assert_eq!(registry.len(), 3);
    }
}
