//! The condition tree: `all`/`any`/`not`/named-reference/leaf nodes, and
//! the parallel annotated tree an evaluation run produces. See spec §3
//! and §4.3.

use crate::error::{Result, RuleForgeError};
use crate::reference::ValueOrRef;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_weight() -> u32 {
    1
}

/// `{ all: [...], priority?, weight?, name? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllCondition {
    pub all: Vec<Condition>,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub name: Option<String>,
}

/// `{ any: [...], priority?, weight?, name? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnyCondition {
    pub any: Vec<Condition>,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub name: Option<String>,
}

/// `{ not: <condition>, priority?, weight?, name? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotCondition {
    pub not: Box<Condition>,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub name: Option<String>,
}

/// `{ condition: "name", priority?, weight?, name? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceCondition {
    pub condition: String,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub name: Option<String>,
}

/// `{ fact, operator, value, path?, params?, priority?, weight?, name? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafCondition {
    pub fact: String,
    pub operator: String,
    pub value: ValueOrRef,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub name: Option<String>,
}

/// A recursive condition node. Exactly one shape is present per spec §3;
/// `#[serde(untagged)]` disambiguates on which required key round-trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    All(AllCondition),
    Any(AnyCondition),
    Not(NotCondition),
    Reference(ReferenceCondition),
    Leaf(LeafCondition),
}

impl Condition {
    pub fn all(children: Vec<Condition>) -> Self {
        Condition::All(AllCondition { all: children, priority: None, weight: 1, name: None })
    }

    pub fn any(children: Vec<Condition>) -> Self {
        Condition::Any(AnyCondition { any: children, priority: None, weight: 1, name: None })
    }

    pub fn not(child: Condition) -> Self {
        Condition::Not(NotCondition { not: Box::new(child), priority: None, weight: 1, name: None })
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Condition::Reference(ReferenceCondition {
            condition: name.into(),
            priority: None,
            weight: 1,
            name: None,
        })
    }

    pub fn leaf(fact: impl Into<String>, operator: impl Into<String>, value: impl Into<ValueOrRef>) -> Self {
        Condition::Leaf(LeafCondition {
            fact: fact.into(),
            operator: operator.into(),
            value: value.into(),
            path: String::new(),
            params: BTreeMap::new(),
            priority: None,
            weight: 1,
            name: None,
        })
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        *(self.priority_mut()) = Some(priority);
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        *(self.weight_mut()) = weight;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        *(self.name_mut()) = Some(name.into());
        self
    }

    /// Override a leaf's `path`; a no-op on non-leaf nodes.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        if let Condition::Leaf(leaf) = &mut self {
            leaf.path = path.into();
        }
        self
    }

    /// Override a leaf's `params`; a no-op on non-leaf nodes.
    pub fn with_params(mut self, params: BTreeMap<String, Value>) -> Self {
        if let Condition::Leaf(leaf) = &mut self {
            leaf.params = params;
        }
        self
    }

    pub fn priority(&self) -> Option<u32> {
        match self {
            Condition::All(c) => c.priority,
            Condition::Any(c) => c.priority,
            Condition::Not(c) => c.priority,
            Condition::Reference(c) => c.priority,
            Condition::Leaf(c) => c.priority,
        }
    }

    fn priority_mut(&mut self) -> &mut Option<u32> {
        match self {
            Condition::All(c) => &mut c.priority,
            Condition::Any(c) => &mut c.priority,
            Condition::Not(c) => &mut c.priority,
            Condition::Reference(c) => &mut c.priority,
            Condition::Leaf(c) => &mut c.priority,
        }
    }

    pub fn weight(&self) -> u32 {
        match self {
            Condition::All(c) => c.weight,
            Condition::Any(c) => c.weight,
            Condition::Not(c) => c.weight,
            Condition::Reference(c) => c.weight,
            Condition::Leaf(c) => c.weight,
        }
    }

    fn weight_mut(&mut self) -> &mut u32 {
        match self {
            Condition::All(c) => &mut c.weight,
            Condition::Any(c) => &mut c.weight,
            Condition::Not(c) => &mut c.weight,
            Condition::Reference(c) => &mut c.weight,
            Condition::Leaf(c) => &mut c.weight,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Condition::All(c) => c.name.as_deref(),
            Condition::Any(c) => c.name.as_deref(),
            Condition::Not(c) => c.name.as_deref(),
            Condition::Reference(c) => c.name.as_deref(),
            Condition::Leaf(c) => c.name.as_deref(),
        }
    }

    fn name_mut(&mut self) -> &mut Option<String> {
        match self {
            Condition::All(c) => &mut c.name,
            Condition::Any(c) => &mut c.name,
            Condition::Not(c) => &mut c.name,
            Condition::Reference(c) => &mut c.name,
            Condition::Leaf(c) => &mut c.name,
        }
    }

    /// Every fact id referenced anywhere in this subtree (used by the
    /// validation engine to compute `F_required`).
    pub fn referenced_facts(&self, out: &mut Vec<String>) {
        match self {
            Condition::All(c) => c.all.iter().for_each(|child| child.referenced_facts(out)),
            Condition::Any(c) => c.any.iter().for_each(|child| child.referenced_facts(out)),
            Condition::Not(c) => c.not.referenced_facts(out),
            Condition::Reference(_) => {}
            Condition::Leaf(c) => out.push(c.fact.clone()),
        }
    }

    /// Whether this subtree has any leaf at all (used by the validation
    /// engine's "no effective conditions" check).
    pub fn has_leaves(&self) -> bool {
        match self {
            Condition::All(c) => c.all.iter().any(Condition::has_leaves),
            Condition::Any(c) => c.any.iter().any(Condition::has_leaves),
            Condition::Not(c) => c.not.has_leaves(),
            Condition::Reference(_) => false,
            Condition::Leaf(_) => true,
        }
    }

    /// Enforce spec §7's construction-time invariants: positive
    /// priority/weight, non-empty required leaf fields (already
    /// structural), recursively.
    pub fn validate(&self) -> Result<()> {
        if let Some(0) = self.priority() {
            return Err(RuleForgeError::InvalidCondition("priority must be >= 1".to_string()));
        }
        if self.weight() == 0 {
            return Err(RuleForgeError::InvalidCondition("weight must be >= 1".to_string()));
        }
        match self {
            Condition::All(c) => c.all.iter().try_for_each(Condition::validate),
            Condition::Any(c) => c.any.iter().try_for_each(Condition::validate),
            Condition::Not(c) => c.not.validate(),
            Condition::Reference(c) => {
                if c.condition.is_empty() {
                    return Err(RuleForgeError::InvalidCondition(
                        "condition reference name must not be empty".to_string(),
                    ));
                }
                Ok(())
            }
            Condition::Leaf(c) => {
                if c.fact.is_empty() || c.operator.is_empty() {
                    return Err(RuleForgeError::InvalidCondition(
                        "leaf requires fact, operator and value".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// The evaluation-produced counterpart to `Condition`: a deep copy
/// annotated with `score`/`result` at every node, plus `fact_result` /
/// `value_result` at leaves (spec §3 RuleResult, §9 design notes).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnnotatedCondition {
    All(AnnotatedAll),
    Any(AnnotatedAny),
    Not(AnnotatedNot),
    Reference(AnnotatedReference),
    Leaf(AnnotatedLeaf),
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedAll {
    pub all: Vec<AnnotatedCondition>,
    pub weight: u32,
    pub priority: Option<u32>,
    pub name: Option<String>,
    pub score: f64,
    pub result: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedAny {
    pub any: Vec<AnnotatedCondition>,
    pub weight: u32,
    pub priority: Option<u32>,
    pub name: Option<String>,
    pub score: f64,
    pub result: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedNot {
    pub not: Box<AnnotatedCondition>,
    pub weight: u32,
    pub priority: Option<u32>,
    pub name: Option<String>,
    pub score: f64,
    pub result: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedReference {
    pub condition: String,
    pub weight: u32,
    pub priority: Option<u32>,
    pub name: Option<String>,
    pub score: f64,
    pub result: bool,
    /// The resolved condition's own annotated tree, deep-copied so that
    /// a named condition shared across rules never cross-talks between
    /// their result trees (spec §9 design note). `None` only when the
    /// reference was unresolved and `allow_undefined_conditions` let
    /// evaluation continue with a failed-leaf score of 0.
    pub resolved: Option<Box<AnnotatedCondition>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedLeaf {
    pub fact: String,
    pub operator: String,
    pub value: ValueOrRef,
    pub path: String,
    pub params: BTreeMap<String, Value>,
    pub weight: u32,
    pub priority: Option<u32>,
    pub name: Option<String>,
    pub score: f64,
    pub result: bool,
    pub fact_result: Value,
    pub value_result: Value,
}

impl AnnotatedCondition {
    pub fn score(&self) -> f64 {
        match self {
            AnnotatedCondition::All(c) => c.score,
            AnnotatedCondition::Any(c) => c.score,
            AnnotatedCondition::Not(c) => c.score,
            AnnotatedCondition::Reference(c) => c.score,
            AnnotatedCondition::Leaf(c) => c.score,
        }
    }

    pub fn result(&self) -> bool {
        match self {
            AnnotatedCondition::All(c) => c.result,
            AnnotatedCondition::Any(c) => c.result,
            AnnotatedCondition::Not(c) => c.result,
            AnnotatedCondition::Reference(c) => c.result,
            AnnotatedCondition::Leaf(c) => c.result,
        }
    }

    pub fn weight(&self) -> u32 {
        match self {
            AnnotatedCondition::All(c) => c.weight,
            AnnotatedCondition::Any(c) => c.weight,
            AnnotatedCondition::Not(c) => c.weight,
            AnnotatedCondition::Reference(c) => c.weight,
            AnnotatedCondition::Leaf(c) => c.weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_nested_all_any_not() {
        let json = r#"{
            "any": [
                { "all": [
                    { "fact": "gameDuration", "operator": "equal", "value": 40 },
                    { "fact": "personalFoulCount", "operator": "greaterThanInclusive", "value": 5 }
                ]},
                { "all": [
                    { "fact": "gameDuration", "operator": "equal", "value": 48 },
                    { "not": { "fact": "personalFoulCount", "operator": "lessThan", "value": 6 } }
                ]}
            ]
        }"#;
        let cond: Condition = serde_json::from_str(json).unwrap();
        assert!(matches!(cond, Condition::Any(_)));
    }

    #[test]
    fn leaf_defaults_weight_to_one() {
        let json = r#"{ "fact": "x", "operator": "equal", "value": 1 }"#;
        let cond: Condition = serde_json::from_str(json).unwrap();
        assert_eq!(cond.weight(), 1);
    }

    #[test]
    fn zero_weight_fails_validation() {
        let cond = Condition::leaf("x", "equal", Value::number(1.0)).with_weight(0);
        assert!(cond.validate().is_err());
    }

    #[test]
    fn referenced_facts_collects_all_leaves() {
        let cond = Condition::all(vec![
            Condition::leaf("a", "equal", Value::number(1.0)),
            Condition::any(vec![Condition::leaf("b", "equal", Value::number(2.0))]),
        ]);
        let mut facts = Vec::new();
        cond.referenced_facts(&mut facts);
        assert_eq!(facts, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn condition_reference_has_no_leaves() {
        let cond = Condition::reference("named");
        assert!(!cond.has_leaves());
    }
}
