//! # Startup Orchestration
//!
//! Turns handler declarations into engine state when the application starts.
//!
//! ## Sequence
//!
//! ```text
//! HandlerDiscovery::deployments() ─→ deploy_process(base_path/file)  (serial, declared order)
//! HandlerDiscovery::workers()     ─→ create_worker(task_type, bound handler, options)
//! ```
//!
//! A failing step carries the owning component and method. Whether it aborts
//! the sequence is decided by [`StartupFailurePolicy`](crate::config::StartupFailurePolicy).

pub mod startup;

pub use startup::{DeploymentRecord, StartupOrchestrator, StartupReport, WorkerRecord};
