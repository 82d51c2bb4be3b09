//! # Connection Lifecycle
//!
//! Creates the workflow-engine client for a named connection, stores it in the
//! [`ConnectionRegistry`] under its client token, and closes it once at
//! application shutdown.
//!
//! ## Registration paths
//!
//! - [`ConnectionManager::register_sync`]: options known up front
//! - [`ConnectionManager::register_async`]: options produced by exactly one of
//!   an existing [`OptionsFactory`], a constructed one, or a factory closure
//!   that receives injected [`Dependencies`]
//!
//! Client construction performs no I/O. Connectivity, and the retry policy in
//! [`ClientOptions`], belong to the client itself.

pub mod registry;

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::{ClientOptions, ZeebeModuleOptions};
use crate::engine::{ClientFactory, WorkflowEngineClient};
use crate::error::{ZeebeError, ZeebeResult};
use crate::token::resolve_connection_name;

pub use registry::ConnectionRegistry;

/// Component that produces connection options asynchronously
#[async_trait]
pub trait OptionsFactory: Send + Sync + 'static {
    async fn create_zeebe_options(&self) -> ZeebeResult<ZeebeModuleOptions>;
}

/// Typed values handed to options factories
///
/// One value per type; inserting the same type again replaces it.
#[derive(Clone, Default)]
pub struct Dependencies {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("count", &self.values.len())
            .finish()
    }
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.values.insert(TypeId::of::<T>(), value);
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| Arc::clone(value).downcast::<T>().ok())
    }

    /// Like [`get`](Self::get) but a missing value is a configuration error
    pub fn require<T: Send + Sync + 'static>(&self) -> ZeebeResult<Arc<T>> {
        self.get::<T>().ok_or_else(|| {
            ZeebeError::configuration(
                "Dependencies",
                format!("no dependency of type {} injected", std::any::type_name::<T>()),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

type ConstructFn = Arc<dyn Fn(&Dependencies) -> ZeebeResult<Arc<dyn OptionsFactory>> + Send + Sync>;
type FactoryFn =
    Arc<dyn Fn(Dependencies) -> BoxFuture<'static, ZeebeResult<ZeebeModuleOptions>> + Send + Sync>;

/// Asynchronous registration options
///
/// Exactly one source must be set.
#[derive(Clone, Default)]
pub struct AsyncModuleOptions {
    pub connection_name: Option<String>,
    use_existing: Option<Arc<dyn OptionsFactory>>,
    use_class: Option<ConstructFn>,
    use_factory: Option<FactoryFn>,
    inject: Dependencies,
}

impl std::fmt::Debug for AsyncModuleOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncModuleOptions")
            .field("connection_name", &self.connection_name)
            .field("sources", &self.source_names())
            .field("inject", &self.inject)
            .finish()
    }
}

impl AsyncModuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection_name(mut self, connection_name: impl Into<String>) -> Self {
        self.connection_name = Some(connection_name.into());
        self
    }

    /// Reuse an existing options factory
    pub fn use_existing(mut self, factory: Arc<dyn OptionsFactory>) -> Self {
        self.use_existing = Some(factory);
        self
    }

    /// Construct the options factory from the injected dependencies
    pub fn use_class<F>(mut self, construct: F) -> Self
    where
        F: Fn(&Dependencies) -> ZeebeResult<Arc<dyn OptionsFactory>> + Send + Sync + 'static,
    {
        self.use_class = Some(Arc::new(construct));
        self
    }

    /// Produce options with an async closure over the injected dependencies
    pub fn use_factory<F, Fut>(mut self, factory: F) -> Self
    where
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ZeebeResult<ZeebeModuleOptions>> + Send + 'static,
    {
        self.use_factory = Some(Arc::new(
            move |deps: Dependencies| -> BoxFuture<'static, ZeebeResult<ZeebeModuleOptions>> {
                Box::pin(factory(deps))
            },
        ));
        self
    }

    /// Make a value available to `use_class` and `use_factory`
    pub fn inject<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.inject.insert(value);
        self
    }

    fn source_names(&self) -> Vec<&'static str> {
        let mut sources = Vec::new();
        if self.use_existing.is_some() {
            sources.push("use_existing");
        }
        if self.use_class.is_some() {
            sources.push("use_class");
        }
        if self.use_factory.is_some() {
            sources.push("use_factory");
        }
        sources
    }

    /// Run the configured source and return the options it produces
    pub async fn resolve(&self) -> ZeebeResult<ZeebeModuleOptions> {
        let sources = self.source_names();
        if sources.len() != 1 {
            return Err(ZeebeError::configuration(
                "AsyncModuleOptions",
                format!(
                    "exactly one of use_existing, use_class or use_factory is required, got [{}]",
                    sources.join(", ")
                ),
            ));
        }

        if let Some(factory) = &self.use_existing {
            return factory.create_zeebe_options().await;
        }
        if let Some(construct) = &self.use_class {
            let factory = construct(&self.inject)?;
            return factory.create_zeebe_options().await;
        }
        match &self.use_factory {
            Some(factory) => factory(self.inject.clone()).await,
            None => Err(ZeebeError::configuration(
                "AsyncModuleOptions",
                "no options source configured",
            )),
        }
    }
}

/// Owns one named connection from registration to shutdown
pub struct ConnectionManager {
    registry: Arc<ConnectionRegistry>,
    connection_name: String,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection_name", &self.connection_name)
            .field("shut_down", &self.shut_down.load(Ordering::Acquire))
            .finish()
    }
}

impl ConnectionManager {
    /// Create and register a client from options known up front
    pub fn register_sync(
        registry: Arc<ConnectionRegistry>,
        factory: &dyn ClientFactory,
        gateway_address: &str,
        client_options: Option<ClientOptions>,
        connection_name: Option<&str>,
    ) -> ZeebeResult<Self> {
        let mut options = ZeebeModuleOptions::new(gateway_address)
            .with_client_options(client_options.unwrap_or_default());
        options.connection_name = connection_name.map(str::to_string);
        Self::register(registry, factory, options)
    }

    /// Resolve options from the async source, then create and register the client
    ///
    /// The connection name is taken from `options.connection_name`, then from
    /// the produced options, then the default.
    pub async fn register_async(
        registry: Arc<ConnectionRegistry>,
        factory: &dyn ClientFactory,
        options: AsyncModuleOptions,
    ) -> ZeebeResult<Self> {
        let mut resolved = options.resolve().await?;
        if options.connection_name.is_some() {
            resolved.connection_name = options.connection_name.clone();
        }
        Self::register(registry, factory, resolved)
    }

    fn register(
        registry: Arc<ConnectionRegistry>,
        factory: &dyn ClientFactory,
        options: ZeebeModuleOptions,
    ) -> ZeebeResult<Self> {
        options.validate()?;
        let connection_name = resolve_connection_name(options.connection_name.as_deref());
        if registry.contains(Some(&connection_name)) {
            return Err(ZeebeError::duplicate_connection(connection_name));
        }

        let client = factory.create_client(&options.gateway_address, &options.client_options)?;
        registry.insert(Some(&connection_name), client)?;

        info!(
            connection_name = %connection_name,
            gateway_address = %options.gateway_address,
            retry = options.client_options.retry,
            max_retries = options.client_options.max_retries,
            "Workflow-engine connection registered"
        );

        Ok(Self {
            registry,
            connection_name,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The live client for this connection
    pub fn client(&self) -> ZeebeResult<Arc<dyn WorkflowEngineClient>> {
        self.registry.require(Some(&self.connection_name))
    }

    /// Close and unregister the client
    ///
    /// Safe to call more than once. Close failures are logged, never returned.
    pub async fn on_shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!(connection_name = %self.connection_name, "Connection already shut down");
            return;
        }

        let Some(client) = self.registry.remove(Some(&self.connection_name)) else {
            debug!(connection_name = %self.connection_name, "No client to close");
            return;
        };

        match client.close().await {
            Ok(()) => info!(connection_name = %self.connection_name, "Workflow-engine connection closed"),
            Err(e) => error!(
                connection_name = %self.connection_name,
                error = %e,
                "Failed to close workflow-engine connection"
            ),
        }
    }
}
