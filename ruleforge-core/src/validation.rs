//! The validation engine: classifies rules against a partial fact set
//! without mutating engine state or emitting events. See spec §4.5.

use crate::condition::{Condition, LeafCondition};
use crate::config::EngineOptions;
use crate::engine::{RuleEngine, RunOptions};
use crate::fact::Fact;
use crate::reference::ValueOrRef;
use crate::rule::{Event, Rule};
use crate::value::Value;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::instrument;

/// A pluggable missing-fact default synthesizer: `(threshold, leaf) ->
/// satisfying value`, consulted before the built-in table (spec §4.5).
pub type DefaultValueProvider = Arc<dyn Fn(&Value, &LeafCondition) -> Value + Send + Sync>;

/// Which of the four buckets a rule fell into (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatisfactionType {
    FullySatisfied,
    PartiallySatisfied,
    Independent,
    Unsatisfied,
}

/// One rule's classification result.
#[derive(Debug, Clone)]
pub struct RuleClassification {
    pub name: String,
    pub priority: u32,
    pub score: f64,
    pub event: Option<Event>,
    pub satisfaction_type: SatisfactionType,
    pub reason: String,
    pub missing_facts: Option<BTreeMap<String, Value>>,
}

impl RuleClassification {
    fn independent(rule: &Rule, score: f64, reason: &str) -> Self {
        RuleClassification {
            name: rule.name.clone(),
            priority: rule.priority,
            score,
            event: None,
            satisfaction_type: SatisfactionType::Independent,
            reason: reason.to_string(),
            missing_facts: None,
        }
    }

    fn unsatisfied(rule: &Rule, reason: &str) -> Self {
        RuleClassification {
            name: rule.name.clone(),
            priority: rule.priority,
            score: 0.0,
            event: None,
            satisfaction_type: SatisfactionType::Unsatisfied,
            reason: reason.to_string(),
            missing_facts: None,
        }
    }
}

/// Per-category counts plus the overall satisfaction rate.
#[derive(Debug, Clone)]
pub struct ClassificationSummary {
    pub total_rules: usize,
    pub fully_satisfied: usize,
    pub partially_satisfied: usize,
    pub independent: usize,
    pub total_satisfied: usize,
    pub unsatisfied: usize,
    pub satisfaction_rate: f64,
}

/// The full bundle `find_satisfied_rules` and its sugar methods return.
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub facts: BTreeMap<String, Value>,
    pub fully_satisfied_rules: Vec<RuleClassification>,
    pub partially_satisfied_rules: Vec<RuleClassification>,
    pub independent_rules: Vec<RuleClassification>,
    pub unsatisfied_rules: Vec<RuleClassification>,
    pub summary: ClassificationSummary,
}

/// Extends `RuleEngine` with analytical classification methods. Built
/// on composition rather than inheritance: `Deref` exposes the full
/// `RuleEngine` API (`add_rule`, `add_fact`, ...) directly.
pub struct ValidationEngine {
    engine: RuleEngine,
    default_providers: DashMap<String, DefaultValueProvider>,
}

impl ValidationEngine {
    pub fn new(options: EngineOptions) -> Self {
        ValidationEngine {
            engine: RuleEngine::new(options),
            default_providers: DashMap::new(),
        }
    }

    pub fn register_default_value_provider(&self, operator: impl Into<String>, provider: DefaultValueProvider) {
        self.default_providers.insert(operator.into(), provider);
    }

    pub fn unregister_default_value_provider(&self, operator: &str) -> bool {
        self.default_providers.remove(operator).is_some()
    }

    /// Classify every registered rule against `facts`. `focused_fact`,
    /// when given, narrows independence to rules that don't reference
    /// it at all (spec §4.5 steps 1-3).
    #[instrument(skip(self, facts), fields(rule_count = self.engine.rule_count()))]
    pub async fn find_satisfied_rules(
        &self,
        facts: BTreeMap<String, Value>,
        focused_fact: Option<&str>,
    ) -> ClassificationResult {
        let rules = self.engine.rules_snapshot();
        let total_rules = rules.len();

        let mut fully_satisfied_rules = Vec::new();
        let mut partially_satisfied_rules = Vec::new();
        let mut independent_rules = Vec::new();
        let mut unsatisfied_rules = Vec::new();

        for rule in &rules {
            let classification = self.classify_rule(rule, &facts, focused_fact).await;
            match classification.satisfaction_type {
                SatisfactionType::FullySatisfied => fully_satisfied_rules.push(classification),
                SatisfactionType::PartiallySatisfied => partially_satisfied_rules.push(classification),
                SatisfactionType::Independent => independent_rules.push(classification),
                SatisfactionType::Unsatisfied => unsatisfied_rules.push(classification),
            }
        }

        let total_satisfied = fully_satisfied_rules.len() + partially_satisfied_rules.len();
        let summary = ClassificationSummary {
            total_rules,
            fully_satisfied: fully_satisfied_rules.len(),
            partially_satisfied: partially_satisfied_rules.len(),
            independent: independent_rules.len(),
            total_satisfied,
            unsatisfied: unsatisfied_rules.len(),
            satisfaction_rate: if total_rules == 0 { 0.0 } else { total_satisfied as f64 / total_rules as f64 },
        };

        ClassificationResult {
            facts,
            fully_satisfied_rules,
            partially_satisfied_rules,
            independent_rules,
            unsatisfied_rules,
            summary,
        }
    }

    /// Sugar: classify with `focused_fact = factId` and `facts =
    /// {factId: factValue} ∪ context`.
    pub async fn find_partially_satisfied_rules(
        &self,
        fact_id: &str,
        fact_value: Value,
        mut context: BTreeMap<String, Value>,
    ) -> ClassificationResult {
        context.insert(fact_id.to_string(), fact_value);
        self.find_satisfied_rules(context, Some(fact_id)).await
    }

    /// Sugar: classify over `context` with no focused fact.
    pub async fn find_partially_satisfied_rules_from_context(
        &self,
        context: BTreeMap<String, Value>,
    ) -> ClassificationResult {
        self.find_satisfied_rules(context, None).await
    }

    async fn classify_rule(
        &self,
        rule: &Rule,
        facts: &BTreeMap<String, Value>,
        focused_fact: Option<&str>,
    ) -> RuleClassification {
        if !rule.conditions.has_leaves() {
            return RuleClassification::independent(rule, 1.0, "independent_and_satisfied");
        }

        let mut required_vec = Vec::new();
        rule.conditions.referenced_facts(&mut required_vec);
        let required: BTreeSet<String> = required_vec.into_iter().collect();

        if let Some(focus) = focused_fact {
            if !required.contains(focus) {
                return RuleClassification::independent(rule, 0.0, "independent_and_satisfied");
            }
        } else if !required.iter().any(|f| facts.contains_key(f)) {
            return RuleClassification::independent(rule, 0.0, "independent_and_satisfied");
        }

        let missing: Vec<String> = required.iter().filter(|f| !facts.contains_key(*f)).cloned().collect();
        let uses_provided = required.iter().any(|f| facts.contains_key(f));

        if !missing.is_empty() && uses_provided {
            self.classify_with_synthesis(rule, facts, &missing).await
        } else if !missing.is_empty() {
            RuleClassification::independent(rule, 0.0, "independent_missing_facts")
        } else {
            self.classify_fully(rule, facts).await
        }
    }

    async fn classify_fully(&self, rule: &Rule, facts: &BTreeMap<String, Value>) -> RuleClassification {
        match self.run_isolated(rule, facts).await {
            Ok((true, score, event)) => RuleClassification {
                name: rule.name.clone(),
                priority: rule.priority,
                score,
                event: Some(event),
                satisfaction_type: SatisfactionType::FullySatisfied,
                reason: "fully_satisfied_with_fact".to_string(),
                missing_facts: None,
            },
            Ok((false, _, _)) => RuleClassification::unsatisfied(rule, "unsatisfied_condition_mismatch"),
            Err(_) => RuleClassification::unsatisfied(rule, "unsatisfied_evaluation_error"),
        }
    }

    async fn classify_with_synthesis(
        &self,
        rule: &Rule,
        facts: &BTreeMap<String, Value>,
        missing: &[String],
    ) -> RuleClassification {
        let mut synthesized = BTreeMap::new();
        for fact_id in missing {
            let leaf = find_leaf_for_fact(&rule.conditions, fact_id);
            let (operator, threshold) = match leaf {
                Some(l) => (l.operator.as_str(), literal_or_null(&l.value)),
                None => ("", Value::Null),
            };
            let provider = self.default_providers.get(operator).map(|p| p.clone());
            let default_value = match (provider, leaf) {
                (Some(provider), Some(leaf)) => provider(&threshold, leaf),
                _ => built_in_default(operator, &threshold),
            };
            synthesized.insert(fact_id.clone(), default_value);
        }

        let mut all_facts = facts.clone();
        all_facts.extend(synthesized.clone());

        match self.run_isolated(rule, &all_facts).await {
            Ok((true, score, event)) => RuleClassification {
                name: rule.name.clone(),
                priority: rule.priority,
                score,
                event: Some(event),
                satisfaction_type: SatisfactionType::PartiallySatisfied,
                reason: "partially_satisfied_missing_facts".to_string(),
                missing_facts: Some(synthesized),
            },
            Ok((false, _, _)) => RuleClassification::unsatisfied(rule, "unsatisfied_condition_mismatch"),
            Err(_) => RuleClassification::unsatisfied(rule, "unsatisfied_condition_mismatch"),
        }
    }

    /// Evaluate `rule` alone, over `facts`, on a temporary engine that
    /// shares the real engine's operators and named conditions but has
    /// no rules, facts or listeners of its own (spec §4.5 isolation).
    async fn run_isolated(&self, rule: &Rule, facts: &BTreeMap<String, Value>) -> crate::error::Result<(bool, f64, Event)> {
        let mut options = self.engine.options().clone();
        options.allow_undefined_facts = true;
        let temp = RuleEngine::with_shared_registry(options, self.engine.registry(), self.engine.named_conditions());

        let mut isolated_rule = rule.clone();
        isolated_rule.on_success = None;
        isolated_rule.on_failure = None;
        temp.add_rule(isolated_rule);

        let runtime_facts: Vec<Fact> = facts
            .iter()
            .map(|(id, value)| Fact::constant(id.clone(), value.clone()))
            .collect();

        let outcome = temp.run(runtime_facts, RunOptions::default()).await?;
        if let Some(result) = outcome.results.into_iter().next() {
            Ok((true, result.score, result.event))
        } else if let Some(result) = outcome.failure_results.into_iter().next() {
            Ok((false, result.score, result.event))
        } else {
            Ok((false, 0.0, rule.event.clone()))
        }
    }
}

impl std::ops::Deref for ValidationEngine {
    type Target = RuleEngine;

    fn deref(&self) -> &RuleEngine {
        &self.engine
    }
}

fn literal_or_null(value: &ValueOrRef) -> Value {
    match value {
        ValueOrRef::Literal(v) => v.clone(),
        ValueOrRef::FactRef(_) => Value::Null,
    }
}

/// Find the first leaf anywhere in `condition` that references
/// `fact_id`. Condition references are not expanded here — the named
/// condition isn't reachable from this context without engine plumbing,
/// so a missing fact reachable only through one goes unsynthesized and
/// falls back to the built-in table's `unknown` row.
fn find_leaf_for_fact<'a>(condition: &'a Condition, fact_id: &str) -> Option<&'a LeafCondition> {
    match condition {
        Condition::Leaf(leaf) if leaf.fact == fact_id => Some(leaf),
        Condition::Leaf(_) => None,
        Condition::All(c) => c.all.iter().find_map(|child| find_leaf_for_fact(child, fact_id)),
        Condition::Any(c) => c.any.iter().find_map(|child| find_leaf_for_fact(child, fact_id)),
        Condition::Not(c) => find_leaf_for_fact(&c.not, fact_id),
        Condition::Reference(_) => None,
    }
}

/// The built-in default-synthesis table from spec §4.5.
fn built_in_default(operator: &str, threshold: &Value) -> Value {
    match operator {
        "equal" => threshold.clone(),
        "notEqual" => match threshold {
            Value::String(s) => Value::string(format!("{s}_different")),
            Value::Number(n) => Value::number(n + 1.0),
            other => other.clone(),
        },
        "greaterThan" => match threshold {
            Value::Number(n) => Value::number(n + 1.0),
            Value::String(s) => match shift_hhmm(s, 30) {
                Some(shifted) => Value::string(shifted),
                None => Value::string(format!("{s}1")),
            },
            other => other.clone(),
        },
        "greaterThanInclusive" => threshold.clone(),
        "lessThan" => match threshold {
            Value::Number(n) => Value::number(n - 1.0),
            Value::String(s) => match shift_hhmm(s, -30) {
                Some(shifted) => Value::string(shifted),
                None => Value::string(drop_last_char(s)),
            },
            other => other.clone(),
        },
        "lessThanInclusive" => threshold.clone(),
        "in" | "contains" | "includes" => match threshold {
            Value::Array(items) if !items.is_empty() => items[0].clone(),
            other => other.clone(),
        },
        _ => threshold.clone(),
    }
}

fn parse_hhmm(s: &str) -> Option<(i64, i64)> {
    let (h, m) = s.split_once(':')?;
    let h: i64 = h.parse().ok()?;
    let m: i64 = m.parse().ok()?;
    if (0..24).contains(&h) && (0..60).contains(&m) {
        Some((h, m))
    } else {
        None
    }
}

fn shift_hhmm(s: &str, delta_minutes: i64) -> Option<String> {
    let (h, m) = parse_hhmm(s)?;
    let total = (h * 60 + m + delta_minutes).max(0);
    Some(format!("{:02}:{:02}", total.div_euclid(60), total.rem_euclid(60)))
}

fn drop_last_char(s: &str) -> String {
    let mut chars = s.chars();
    chars.next_back();
    chars.as_str().to_string()
}
