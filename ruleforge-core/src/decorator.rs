//! Decorators: operator wrappers composed by colon-chained names, e.g.
//! `swap:not:startsWithLetter`. See spec §3 and §4.1.

use crate::value::Value;
use std::sync::Arc;

/// The operator (or partially-composed decorator chain) a decorator
/// wraps. Already validated and clamped — decorators only ever see a
/// score in `[0,1]` as `next`'s output.
pub type NextEvaluator<'a> = &'a dyn Fn(&Value, &Value) -> f64;

/// A named operator wrapper.
#[derive(Clone)]
pub struct Decorator {
    /// Registered name, e.g. `"everyFact"`.
    pub name: String,
    wrap: Arc<dyn Fn(&Value, &Value, NextEvaluator) -> f64 + Send + Sync>,
}

impl Decorator {
    /// Build a decorator from its wrapping function.
    pub fn new(
        name: impl Into<String>,
        wrap: Arc<dyn Fn(&Value, &Value, NextEvaluator) -> f64 + Send + Sync>,
    ) -> Self {
        Decorator {
            name: name.into(),
            wrap,
        }
    }

    /// Apply this decorator around `next`.
    pub fn apply(&self, lhs: &Value, rhs: &Value, next: NextEvaluator) -> f64 {
        (self.wrap)(lhs, rhs, next).clamp(0.0, 1.0)
    }
}

fn mean(scores: impl Iterator<Item = f64>, empty_default: f64) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for s in scores {
        sum += s;
        count += 1;
    }
    if count == 0 {
        empty_default
    } else {
        sum / count as f64
    }
}

fn max_or(scores: impl Iterator<Item = f64>, empty_default: f64) -> f64 {
    let mut best: Option<f64> = None;
    for s in scores {
        best = Some(match best {
            Some(b) if b >= s => b,
            _ => s,
        });
    }
    best.unwrap_or(empty_default)
}

/// The six built-in decorators from spec §4.1.
pub fn builtins() -> Vec<Decorator> {
    vec![
        Decorator::new(
            "everyFact",
            Arc::new(|lhs, rhs, next| match lhs.as_array() {
                Some(items) => mean(items.iter().map(|elem| next(elem, rhs)), 1.0),
                None => 0.0,
            }),
        ),
        Decorator::new(
            "someFact",
            Arc::new(|lhs, rhs, next| match lhs.as_array() {
                Some(items) => max_or(items.iter().map(|elem| next(elem, rhs)), 0.0),
                None => 0.0,
            }),
        ),
        Decorator::new(
            "everyValue",
            Arc::new(|lhs, rhs, next| match rhs.as_array() {
                Some(items) => mean(items.iter().map(|elem| next(lhs, elem)), 1.0),
                None => 0.0,
            }),
        ),
        Decorator::new(
            "someValue",
            Arc::new(|lhs, rhs, next| match rhs.as_array() {
                Some(items) => max_or(items.iter().map(|elem| next(lhs, elem)), 0.0),
                None => 0.0,
            }),
        ),
        Decorator::new("swap", Arc::new(|lhs, rhs, next| next(rhs, lhs))),
        Decorator::new(
            "not",
            Arc::new(|lhs, rhs, next| if next(lhs, rhs) < 1.0 { 1.0 } else { 0.0 }),
        ),
    ]
}
