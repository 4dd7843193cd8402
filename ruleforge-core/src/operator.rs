//! Operators: named comparators returning a score in `[0,1]`. See spec
//! §3 and §4.1.

use crate::value::Value;
use std::sync::Arc;

/// A pure, synchronous evaluator function.
pub type EvaluateFn = Arc<dyn Fn(&Value, &Value) -> f64 + Send + Sync>;
/// A pure LHS validator; rejecting the LHS forces the score to 0.
pub type ValidatorFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A named comparator. `evaluate` need not itself clamp into `[0,1]` —
/// the registry clamps on every call (spec §3 Operator invariant).
#[derive(Clone)]
pub struct Operator {
    /// Registered name, e.g. `"greaterThan"`.
    pub name: String,
    evaluate: EvaluateFn,
    validator: Option<ValidatorFn>,
}

impl Operator {
    /// Build an operator with no LHS restriction.
    pub fn new(name: impl Into<String>, evaluate: EvaluateFn) -> Self {
        Operator {
            name: name.into(),
            evaluate,
            validator: None,
        }
    }

    /// Attach a validator: when it rejects the LHS, `run` returns 0
    /// without invoking `evaluate`.
    pub fn with_validator(mut self, validator: ValidatorFn) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Run the operator, applying the validator and clamping to `[0,1]`.
    pub fn run(&self, lhs: &Value, rhs: &Value) -> f64 {
        if let Some(validator) = &self.validator {
            if !validator(lhs) {
                return 0.0;
            }
        }
        (self.evaluate)(lhs, rhs).clamp(0.0, 1.0)
    }
}

/// Roughly 250 units of violation decays a failing numeric comparison's
/// score to `1/e`. Chosen to match the worked example in spec §8
/// scenario 4 (a magnitude-250 overshoot scores `exp(-1) ≈ 0.368`).
const GRADIENT_SCALE: f64 = 250.0;

/// Unconditional floor added to strict numeric comparisons so that an
/// exact-equality input never scores exactly 1.0 (spec §4.1: "strict
/// inequalities never reach exactly 1 when the inputs are equal").
const STRICT_EPSILON: f64 = 1e-6;

fn is_numeric(v: &Value) -> bool {
    v.as_f64().is_some()
}

/// `exp(-max(0, shortfall)/250)`, with `extra_floor` added after the
/// clamp so strict operators never reach exactly 1.0 even when the
/// comparison passes with room to spare.
fn gradient_score(shortfall: f64, extra_floor: f64) -> f64 {
    let delta = shortfall.max(0.0) / GRADIENT_SCALE + extra_floor;
    (-delta).exp()
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b
}

fn array_contains(haystack: &[Value], needle: &Value) -> bool {
    haystack.iter().any(|v| values_equal(v, needle))
}

/// The ten built-in operators from spec §4.1.
pub fn builtins() -> Vec<Operator> {
    vec![
        Operator::new(
            "equal",
            Arc::new(|a, b| if values_equal(a, b) { 1.0 } else { 0.0 }),
        ),
        Operator::new(
            "notEqual",
            Arc::new(|a, b| if values_equal(a, b) { 0.0 } else { 1.0 }),
        ),
        Operator::new(
            "in",
            Arc::new(|a, b| match b.as_array() {
                Some(items) if array_contains(items, a) => 1.0,
                _ => 0.0,
            }),
        ),
        Operator::new(
            "notIn",
            Arc::new(|a, b| match b.as_array() {
                Some(items) if array_contains(items, a) => 0.0,
                _ => 1.0,
            }),
        ),
        Operator::new(
            "contains",
            Arc::new(|a, b| match a.as_array() {
                Some(items) if array_contains(items, b) => 1.0,
                _ => 0.0,
            }),
        )
        .with_validator(Arc::new(|a| a.as_array().is_some())),
        Operator::new(
            "doesNotContain",
            Arc::new(|a, b| match a.as_array() {
                Some(items) if array_contains(items, b) => 0.0,
                _ => 1.0,
            }),
        )
        .with_validator(Arc::new(|a| a.as_array().is_some())),
        Operator::new(
            "lessThan",
            Arc::new(|a, b| {
                let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                gradient_score(a - b, STRICT_EPSILON)
            }),
        )
        .with_validator(Arc::new(is_numeric)),
        Operator::new(
            "lessThanInclusive",
            Arc::new(|a, b| {
                let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                gradient_score(a - b, 0.0)
            }),
        )
        .with_validator(Arc::new(is_numeric)),
        Operator::new(
            "greaterThan",
            Arc::new(|a, b| {
                let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                gradient_score(b - a, STRICT_EPSILON)
            }),
        )
        .with_validator(Arc::new(is_numeric)),
        Operator::new(
            "greaterThanInclusive",
            Arc::new(|a, b| {
                let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                gradient_score(b - a, 0.0)
            }),
        )
        .with_validator(Arc::new(is_numeric)),
    ]
}
