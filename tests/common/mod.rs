#![allow(dead_code)]

pub mod doubles;
pub mod strategies;

pub use doubles::*;

use serde_json::Value;
use zeebe_connect::engine::ProcessVariables;

/// Object-shaped JSON as process variables
pub fn variables(value: Value) -> ProcessVariables {
    value.as_object().cloned().unwrap_or_default()
}
