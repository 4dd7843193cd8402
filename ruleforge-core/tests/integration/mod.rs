//! Shared scenario modules for the crate-level integration suite.

mod dynamic_facts;
mod scenarios;
mod validation_flow;

use ruleforge_core::Value;
use std::collections::BTreeMap;

/// Build a `factId -> Value` map from `(&str, Value)` pairs, the shape
/// every scenario in this suite starts from.
fn facts(pairs: Vec<(&str, Value)>) -> BTreeMap<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
