//! The tagged-union value type every fact, threshold and event param carries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A freely-typed value flowing through facts, conditions and events.
///
/// `#[serde(untagged)]` gives round-trip-compatible JSON: a rule's
/// `value: 40` deserializes straight into `Value::Number(40.0)`, no
/// wrapper object required.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number. Always stored as `f64`; the exponential-gradient
    /// operators need float math and integers round-trip through it
    /// exactly up to 2^53.
    Number(f64),
    /// JSON string.
    String(Arc<str>),
    /// JSON array.
    Array(Arc<[Value]>),
    /// JSON object. `BTreeMap` keeps iteration order deterministic,
    /// which matters for hashing cache keys.
    Object(Arc<BTreeMap<String, Value>>),
}

impl Value {
    /// Build a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Arc::from(s.into().into_boxed_str()))
    }

    /// Build a number value.
    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    /// Build an array value.
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Arc::from(values.into_boxed_slice()))
    }

    /// Build an object value.
    pub fn object(map: BTreeMap<String, Value>) -> Self {
        Value::Object(Arc::new(map))
    }

    /// View this value as `f64`, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// View this value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// View this value as a slice, if it is an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a.as_ref()),
            _ => None,
        }
    }

    /// Project a dotted/bracketed field path out of this value, if it is
    /// an object (or array, for numeric segments). Non-object, non-array
    /// values pass through `path` projection unchanged per spec §4.2.
    pub fn project(&self, path: &str) -> Option<Value> {
        crate::path::resolve(self, path)
    }

    /// Stable textual form used to build cache keys and for `equal`
    /// comparisons against mixed representations of the same value.
    pub fn canonical_key(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => format!("b:{b}"),
            Value::Number(n) => format!("n:{}", canonical_number(*n)),
            Value::String(s) => format!("s:{s}"),
            Value::Array(a) => {
                let parts: Vec<String> = a.iter().map(Value::canonical_key).collect();
                format!("a:[{}]", parts.join(","))
            }
            Value::Object(o) => {
                let parts: Vec<String> = o
                    .iter()
                    .map(|(k, v)| format!("{k}={}", v.canonical_key()))
                    .collect();
                format!("o:{{{}}}", parts.join(","))
            }
        }
    }
}

/// Render a float with a stable representation so `1.0` and `1` hash the
/// same way once both have gone through `Value::Number`.
fn canonical_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}
