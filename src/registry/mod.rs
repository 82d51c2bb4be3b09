//! # Handler Registry
//!
//! Worker and deployment declarations made by application components.
//!
//! ## Architecture
//!
//! ```text
//! ZeebeHandlers::register_handlers ──→ HandlerRegistry ──(HandlerDiscovery)──→ StartupOrchestrator
//!   register_worker      → WorkerDeclaration     { task_type, options, bound handler, owner.method }
//!   register_deployment  → DeploymentDeclaration { base_path, processes, owner.method }
//! ```

pub mod declaration;
pub mod handler_registry;

pub use declaration::{DeploymentDeclaration, HandlerDeclaration, HandlerIdentity, WorkerDeclaration};
pub use handler_registry::{HandlerDiscovery, HandlerRegistry, ZeebeHandlers};
