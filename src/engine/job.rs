//! Task handler contract for jobs activated by a worker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

use super::ProcessVariables;

/// One activated unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZeebeJob {
    pub key: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub process_instance_key: String,
    pub bpmn_process_id: String,
    pub element_id: String,
    pub retries: i32,
    #[serde(default)]
    pub custom_headers: Map<String, Value>,
    #[serde(default)]
    pub variables: ProcessVariables,
}

impl ZeebeJob {
    /// Variable lookup by name
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Correlation channel injected by `start_process_and_await_result`, if any
    pub fn validation_channel(&self) -> Option<&str> {
        self.variable(crate::constants::VALIDATION_CHANNEL_FIELD)
            .and_then(Value::as_str)
    }
}

/// How a handler finished a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Complete the job, merging these variables into the process scope
    Complete { variables: ProcessVariables },
    /// Fail the job; the engine retries while `retries` stays positive
    Fail { message: String, retries: i32 },
    /// Throw a BPMN error to be caught by a boundary event
    Error { code: String, message: String },
}

impl JobOutcome {
    pub fn complete(variables: ProcessVariables) -> Self {
        Self::Complete { variables }
    }

    pub fn complete_empty() -> Self {
        Self::Complete {
            variables: Map::new(),
        }
    }

    pub fn fail(message: impl Into<String>, retries: i32) -> Self {
        Self::Fail {
            message: message.into(),
            retries,
        }
    }

    pub fn bpmn_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Invoked by the engine for every job of the worker's task type
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, job: ZeebeJob) -> JobOutcome;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(ZeebeJob) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = JobOutcome> + Send + 'static,
{
    async fn handle(&self, job: ZeebeJob) -> JobOutcome {
        (self.0)(job).await
    }
}

/// Wrap an async closure as a task handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn TaskHandler>
where
    F: Fn(ZeebeJob) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = JobOutcome> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
