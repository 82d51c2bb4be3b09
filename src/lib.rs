#![allow(clippy::doc_markdown)] // Allow technical terms like BPMN, Zeebe in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Zeebe Connect
//!
//! Wires a Zeebe workflow-engine client into an application's lifecycle and
//! correlates started process instances with results published over pub/sub.
//!
//! ## Overview
//!
//! - **Connections**: a client per named connection, created from static or
//!   asynchronously produced options and closed once at shutdown
//! - **Handlers**: components declare task workers and process deployments
//!   explicitly; startup deploys and attaches them
//! - **Result correlation**: `start_process_and_await_result` subscribes a
//!   dedicated connection to a per-call channel, starts the instance with the
//!   channel injected as `validationChannel`, and returns the first of the
//!   matching result or a timeout result
//!
//! The gRPC gateway client itself is supplied by the host application: it
//! implements [`engine::WorkflowEngineClient`] and is constructed through an
//! [`engine::ClientFactory`]. [`testing::InMemoryWorkflowEngine`] stands in for
//! it in tests.
//!
//! ## Module Organization
//!
//! - [`config`] - Options, startup policy, file/env loader
//! - [`connection`] - Connection registry and lifecycle manager
//! - [`engine`] - Workflow-engine client boundary
//! - [`pubsub`] - Pub/sub broker boundary and providers
//! - [`registry`] - Worker and deployment declarations
//! - [`orchestration`] - Startup deployment and worker registration
//! - [`process_client`] - Process start and result correlation
//! - [`module`] - Lifecycle composition root
//! - [`testing`] - In-memory workflow engine
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use zeebe_connect::config::{ClientOptions, ConfigLoader, ProcessClientConfig};
//! use zeebe_connect::connection::ConnectionRegistry;
//! use zeebe_connect::engine::WorkflowEngineClient;
//! use zeebe_connect::error::ZeebeResult;
//! use zeebe_connect::module::ZeebeModule;
//! use zeebe_connect::process_client::AwaitOptions;
//! use zeebe_connect::pubsub::{PubSubClient, PubSubRegistry};
//!
//! // Host-provided gateway client and pub/sub connection
//! # fn connect_gateway(_: &str, _: &ClientOptions) -> ZeebeResult<Arc<dyn WorkflowEngineClient>> { unimplemented!() }
//! # fn shared_subscriber() -> Arc<dyn PubSubClient> { unimplemented!() }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! zeebe_connect::logging::init_structured_logging();
//!
//! let config = ConfigLoader::new().with_file("config/zeebe.toml").load()?;
//! let module = ZeebeModule::for_root(
//!     Arc::new(ConnectionRegistry::new()),
//!     &connect_gateway,
//!     &config,
//! )?;
//! module.on_module_init().await?;
//!
//! let pubsub = PubSubRegistry::new();
//! pubsub.register("consumer", shared_subscriber());
//! let client = module.process_client(&pubsub, ProcessClientConfig::default())?;
//!
//! let result = client
//!     .start_process_and_await_result(
//!         "order-process",
//!         &serde_json::json!({"orderId": 42}),
//!         AwaitOptions::new(Duration::from_secs(10)).with_timeout_value("PENDING".into()),
//!     )
//!     .await?;
//! println!("timed out: {}", result.is_timeout());
//!
//! module.on_application_shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod constants;
pub mod engine;
pub mod error;
pub mod logging;
pub mod module;
pub mod orchestration;
pub mod process_client;
pub mod pubsub;
pub mod registry;
pub mod testing;
pub mod token;

pub use config::{
    ClientOptions, ConfigLoader, ProcessClientConfig, StartupConfig, StartupFailurePolicy,
    ZeebeConfig, ZeebeModuleOptions,
};
pub use connection::{
    AsyncModuleOptions, ConnectionManager, ConnectionRegistry, Dependencies, OptionsFactory,
};
pub use engine::{
    ClientFactory, CreateProcessInstanceResponse, JobOutcome, TaskHandler, WorkerOptions,
    WorkflowEngineClient, ZeebeJob,
};
pub use error::{ZeebeError, ZeebeResult};
pub use module::ZeebeModule;
pub use orchestration::{StartupOrchestrator, StartupReport};
pub use process_client::{AwaitOptions, CorrelationOutcome, ProcessClient, ProcessInstanceResult};
pub use pubsub::{PubSubClient, PubSubRegistry, SubscriptionConnection};
pub use registry::{HandlerDiscovery, HandlerRegistry, ZeebeHandlers};
pub use token::client_token;
