//! Operator registry: owns named operators and decorators, and resolves
//! colon-chained names (`d1:d2:op`) into a single composed operator.
//! See spec §3 and §4.1.

use crate::decorator::{builtins as decorator_builtins, Decorator};
use crate::error::{Result, RuleForgeError};
use crate::operator::{builtins as operator_builtins, Operator};
use crate::value::Value;
use dashmap::DashMap;
use std::sync::Arc;

type ComposedFn = Arc<dyn Fn(&Value, &Value) -> f64 + Send + Sync>;

/// Owns the operator and decorator tables and resolves evaluator names.
pub struct OperatorRegistry {
    operators: DashMap<String, Operator>,
    decorators: DashMap<String, Decorator>,
    /// Memoized resolved chains, keyed by the full colon-joined name.
    resolved: DashMap<String, Operator>,
}

impl OperatorRegistry {
    /// Build a registry pre-populated with the built-in operators and
    /// decorators from spec §4.1.
    pub fn new() -> Self {
        let registry = OperatorRegistry {
            operators: DashMap::new(),
            decorators: DashMap::new(),
            resolved: DashMap::new(),
        };
        for op in operator_builtins() {
            registry.operators.insert(op.name.clone(), op);
        }
        for dec in decorator_builtins() {
            registry.decorators.insert(dec.name.clone(), dec);
        }
        registry
    }

    /// An empty registry with no built-ins — mainly useful for the
    /// validation engine's isolated temporary engines, which start from
    /// a copy of the caller's operators rather than the defaults.
    pub fn empty() -> Self {
        OperatorRegistry {
            operators: DashMap::new(),
            decorators: DashMap::new(),
            resolved: DashMap::new(),
        }
    }

    /// Register (or replace) an operator and invalidate any resolved
    /// chain that used its name as a suffix.
    pub fn add_operator(&self, operator: Operator) {
        self.operators.insert(operator.name.clone(), operator);
        self.resolved.clear();
    }

    /// Remove an operator by name.
    pub fn remove_operator(&self, name: &str) -> bool {
        let removed = self.operators.remove(name).is_some();
        if removed {
            self.resolved.clear();
        }
        removed
    }

    /// Register (or replace) a decorator.
    pub fn add_decorator(&self, decorator: Decorator) {
        self.decorators.insert(decorator.name.clone(), decorator);
        self.resolved.clear();
    }

    /// Remove a decorator by name.
    pub fn remove_decorator(&self, name: &str) -> bool {
        let removed = self.decorators.remove(name).is_some();
        if removed {
            self.resolved.clear();
        }
        removed
    }

    /// Resolve a (possibly colon-chained) operator name into a single
    /// composed `Operator`. Resolutions are memoized.
    pub fn get(&self, name: &str) -> Result<Operator> {
        if let Some(op) = self.resolved.get(name) {
            return Ok(op.clone());
        }

        let segments: Vec<&str> = name.split(':').collect();
        let (decorator_names, suffix) = segments.split_at(segments.len() - 1);
        let suffix = suffix[0];

        let base = self
            .operators
            .get(suffix)
            .ok_or_else(|| RuleForgeError::UnknownOperator(name.to_string()))?
            .clone();

        let mut decorators = Vec::with_capacity(decorator_names.len());
        for dec_name in decorator_names {
            let dec = self
                .decorators
                .get(*dec_name)
                .ok_or_else(|| RuleForgeError::UnknownDecorator(name.to_string()))?
                .clone();
            decorators.push(dec);
        }

        let mut composed: ComposedFn = {
            let base = base.clone();
            Arc::new(move |a: &Value, b: &Value| base.run(a, b))
        };
        for dec in decorators.iter().rev() {
            let dec = dec.clone();
            let prev = composed.clone();
            composed = Arc::new(move |a: &Value, b: &Value| dec.apply(a, b, &|x, y| prev(x, y)));
        }

        let resolved_op = Operator::new(name.to_string(), composed);
        self.resolved.insert(name.to_string(), resolved_op.clone());
        Ok(resolved_op)
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
