//! Handler declarations: worker and deployment markers attached to component methods.

use std::path::PathBuf;
use std::sync::Arc;

use crate::constants::MarkerKind;
use crate::engine::{TaskHandler, WorkerConfig, WorkerOptions};

/// Owning component and method a declaration was made on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerIdentity {
    pub owner: String,
    pub method: String,
}

impl HandlerIdentity {
    pub fn new(owner: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            method: method.into(),
        }
    }

    /// Identity for a method on `T`, named after the last path segment of its type
    pub fn of<T: ?Sized>(method: impl Into<String>) -> Self {
        Self::new(short_type_name::<T>(), method)
    }
}

impl std::fmt::Display for HandlerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.owner, self.method)
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// "This method handles jobs of task type T"
#[derive(Clone)]
pub struct WorkerDeclaration {
    pub task_type: String,
    pub options: WorkerOptions,
    /// Method bound to its owning instance
    pub handler: Arc<dyn TaskHandler>,
    pub identity: HandlerIdentity,
}

impl std::fmt::Debug for WorkerDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerDeclaration")
            .field("task_type", &self.task_type)
            .field("options", &self.options)
            .field("identity", &self.identity)
            .finish()
    }
}

impl WorkerDeclaration {
    /// Engine-facing worker configuration
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            task_type: self.task_type.clone(),
            handler: Arc::clone(&self.handler),
            options: self.options.clone(),
        }
    }
}

/// "This method's process definitions live at P with files F"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentDeclaration {
    pub base_path: PathBuf,
    /// File names, deployed in this order
    pub processes: Vec<String>,
    pub identity: HandlerIdentity,
}

impl DeploymentDeclaration {
    /// `base_path/file` for every listed process, in declared order
    pub fn resource_paths(&self) -> Vec<PathBuf> {
        self.processes
            .iter()
            .map(|file| self.base_path.join(file))
            .collect()
    }
}

/// Either kind of handler declaration
#[derive(Debug, Clone)]
pub enum HandlerDeclaration {
    Worker(WorkerDeclaration),
    Deployment(DeploymentDeclaration),
}

impl HandlerDeclaration {
    pub fn kind(&self) -> MarkerKind {
        match self {
            HandlerDeclaration::Worker(_) => MarkerKind::Worker,
            HandlerDeclaration::Deployment(_) => MarkerKind::Deployment,
        }
    }

    pub fn identity(&self) -> &HandlerIdentity {
        match self {
            HandlerDeclaration::Worker(worker) => &worker.identity,
            HandlerDeclaration::Deployment(deployment) => &deployment.identity,
        }
    }
}
