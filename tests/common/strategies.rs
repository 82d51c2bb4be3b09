//! Proptest strategies for correlation inputs

use proptest::prelude::*;
use serde_json::Value;
use zeebe_connect::engine::ProcessVariables;

/// Colon-separated channel prefixes such as `zeebe:validation`
pub fn channel_prefix_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9_-]{0,11}", 1..4).prop_map(|parts| parts.join(":"))
}

/// Flat scalar JSON values
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
    ]
}

/// Process variables, sometimes carrying a caller-supplied `validationChannel`
pub fn variables_strategy() -> impl Strategy<Value = ProcessVariables> {
    (
        prop::collection::btree_map("[a-zA-Z][a-zA-Z0-9]{0,10}", scalar_strategy(), 0..8),
        prop::option::of("[a-z:]{1,20}"),
    )
        .prop_map(|(entries, spoofed)| {
            let mut variables: ProcessVariables = entries.into_iter().collect();
            if let Some(channel) = spoofed {
                variables.insert("validationChannel".to_string(), Value::String(channel));
            }
            variables
        })
}
