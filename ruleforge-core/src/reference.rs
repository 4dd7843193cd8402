//! Fact-reference objects: the `{ fact, params?, path? }` shape that can
//! stand in for a literal wherever spec §3 allows "value may itself be a
//! fact reference" — leaf `value` and event `params` entries alike.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Either a literal value or a reference to another fact.
///
/// `#[serde(untagged)]` tries `FactRef` first: a JSON object is only
/// accepted as a reference if it carries the required `fact` key,
/// otherwise it falls through to `Literal` (which covers `Value::Object`
/// too, so an ordinary object-valued threshold still round-trips).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueOrRef {
    /// `{ fact, params?, path? }`.
    FactRef(FactRef),
    /// Anything else — a plain JSON scalar, array or object.
    Literal(Value),
}

/// A reference to another fact's value, optionally projected by `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRef {
    /// The referenced fact's id.
    pub fact: String,
    /// Parameters to pass to the fact's computation.
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    /// Optional path projected out of the resolved value.
    #[serde(default)]
    pub path: String,
}

impl From<Value> for ValueOrRef {
    fn from(v: Value) -> Self {
        ValueOrRef::Literal(v)
    }
}
