//! # Zeebe Module
//!
//! Composition root: one named connection, the handlers declared against
//! it, and the startup/shutdown hooks the host application calls.
//!
//! ```text
//! for_root / for_root_async ─→ ConnectionManager (client registered)
//! with_handlers             ─→ HandlerRegistry
//! on_module_init            ─→ StartupOrchestrator::run       (once, not retried after failure)
//! process_client            ─→ ProcessClient (engine + named pub/sub client)
//! on_application_shutdown   ─→ ConnectionManager::on_shutdown (idempotent)
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ProcessClientConfig, StartupConfig, ZeebeConfig};
use crate::connection::{AsyncModuleOptions, ConnectionManager, ConnectionRegistry};
use crate::engine::{ClientFactory, WorkflowEngineClient};
use crate::error::{ZeebeError, ZeebeResult};
use crate::orchestration::{StartupOrchestrator, StartupReport};
use crate::process_client::ProcessClient;
use crate::pubsub::PubSubRegistry;
use crate::registry::HandlerRegistry;

const INIT_PENDING: u8 = 0;
const INIT_STARTED: u8 = 1;
const INIT_FAILED: u8 = 2;

/// Wires a connection and its handlers into the application lifecycle
#[derive(Debug)]
pub struct ZeebeModule {
    connection: ConnectionManager,
    handlers: Arc<HandlerRegistry>,
    startup: StartupConfig,
    init_state: AtomicU8,
}

impl ZeebeModule {
    /// Register the connection described by a loaded configuration
    pub fn for_root(
        registry: Arc<ConnectionRegistry>,
        factory: &dyn ClientFactory,
        config: &ZeebeConfig,
    ) -> ZeebeResult<Self> {
        config.validate()?;
        let connection = ConnectionManager::register_sync(
            registry,
            factory,
            &config.gateway_address,
            Some(config.client_options.clone()),
            config.connection_name.as_deref(),
        )?;
        Ok(Self::from_connection(connection, config.startup.clone()))
    }

    /// Register a connection whose options are produced asynchronously
    pub async fn for_root_async(
        registry: Arc<ConnectionRegistry>,
        factory: &dyn ClientFactory,
        options: AsyncModuleOptions,
        startup: StartupConfig,
    ) -> ZeebeResult<Self> {
        let connection = ConnectionManager::register_async(registry, factory, options).await?;
        Ok(Self::from_connection(connection, startup))
    }

    fn from_connection(connection: ConnectionManager, startup: StartupConfig) -> Self {
        Self {
            connection,
            handlers: Arc::new(HandlerRegistry::new()),
            startup,
            init_state: AtomicU8::new(INIT_PENDING),
        }
    }

    /// Use a shared handler registry instead of the module's own
    pub fn with_handlers(mut self, handlers: Arc<HandlerRegistry>) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn client(&self) -> ZeebeResult<Arc<dyn WorkflowEngineClient>> {
        self.connection.client()
    }

    /// Deploy declared definitions and attach declared workers
    ///
    /// Returns `None` when the startup sequence already ran. A failed sequence
    /// may have deployed definitions and attached workers before stopping, so
    /// it is not re-run: later calls return a configuration error.
    pub async fn on_module_init(&self) -> ZeebeResult<Option<StartupReport>> {
        match self.init_state.compare_exchange(
            INIT_PENDING,
            INIT_STARTED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(INIT_FAILED) => {
                return Err(ZeebeError::configuration(
                    "ZeebeModule",
                    "startup sequence failed earlier and cannot be re-run",
                ));
            }
            Err(_) => {
                debug!(
                    connection_name = %self.connection.connection_name(),
                    "Startup sequence already ran"
                );
                return Ok(None);
            }
        }

        let report = match self.run_startup().await {
            Ok(report) => report,
            Err(e) => {
                self.init_state.store(INIT_FAILED, Ordering::Release);
                return Err(e);
            }
        };
        info!(
            connection_name = %self.connection.connection_name(),
            deployments = report.deployments.len(),
            workers = report.workers.len(),
            "Zeebe module initialized"
        );
        Ok(Some(report))
    }

    async fn run_startup(&self) -> ZeebeResult<StartupReport> {
        let orchestrator = StartupOrchestrator::new(self.client()?, &self.startup);
        orchestrator.run(self.handlers.as_ref()).await
    }

    /// Process client bound to this connection's engine
    pub fn process_client(
        &self,
        pubsub: &PubSubRegistry,
        config: ProcessClientConfig,
    ) -> ZeebeResult<ProcessClient> {
        ProcessClient::from_registry(self.client()?, pubsub, config)
    }

    /// Close the connection; later calls do nothing
    pub async fn on_application_shutdown(&self) {
        self.connection.on_shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{JobOutcome, WorkerOptions, ZeebeJob};
    use crate::pubsub::InMemoryBroker;
    use crate::testing::InMemoryClientFactory;

    struct Notifications;

    impl Notifications {
        async fn send(self: Arc<Self>, _job: ZeebeJob) -> JobOutcome {
            JobOutcome::complete_empty()
        }
    }

    fn config() -> ZeebeConfig {
        ZeebeConfig {
            gateway_address: "zeebe:26500".to_string(),
            connection_name: Some("notifications".to_string()),
            ..ZeebeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_lifecycle_runs_startup_once_and_shuts_down_once() {
        let registry = Arc::new(ConnectionRegistry::new());
        let factory = InMemoryClientFactory::new();
        let module = ZeebeModule::for_root(Arc::clone(&registry), &factory, &config()).unwrap();
        module.handlers().register_worker(
            Arc::new(Notifications),
            "send",
            "send-email",
            WorkerOptions::default(),
            Notifications::send,
        );

        let report = module.on_module_init().await.unwrap().unwrap();
        assert_eq!(report.workers.len(), 1);
        assert!(module.on_module_init().await.unwrap().is_none());

        let engine = factory.last().unwrap();
        assert_eq!(engine.worker_task_types(), vec!["send-email".to_string()]);

        module.on_application_shutdown().await;
        module.on_application_shutdown().await;
        assert_eq!(engine.close_count(), 1);
        assert!(!registry.contains(Some("notifications")));
    }

    #[tokio::test]
    async fn test_failed_startup_is_reported_on_retry() {
        let factory = InMemoryClientFactory::new();
        let module =
            ZeebeModule::for_root(Arc::new(ConnectionRegistry::new()), &factory, &config()).unwrap();
        module.handlers().register_worker(
            Arc::new(Notifications),
            "send",
            "send-email",
            WorkerOptions::default(),
            Notifications::send,
        );
        let engine = factory.last().unwrap();
        engine.fail_worker("send-email");

        let err = module.on_module_init().await.unwrap_err();
        assert!(matches!(err, ZeebeError::WorkerRegistration { .. }));

        let err = module.on_module_init().await.unwrap_err();
        assert!(matches!(err, ZeebeError::Configuration { .. }));
        assert!(err.to_string().contains("cannot be re-run"));
        assert!(engine.worker_task_types().is_empty());
    }

    #[test]
    fn test_process_client_uses_named_pubsub_client() {
        let registry = Arc::new(ConnectionRegistry::new());
        let module =
            ZeebeModule::for_root(registry, &InMemoryClientFactory::new(), &config()).unwrap();

        let pubsub = PubSubRegistry::new();
        assert!(module
            .process_client(&pubsub, ProcessClientConfig::default())
            .is_err());

        pubsub.register("consumer", Arc::new(InMemoryBroker::new()));
        assert!(module
            .process_client(&pubsub, ProcessClientConfig::default())
            .is_ok());
    }
}
