//! The condition evaluator: walks a `Condition` tree against an
//! `Almanac`, producing an `AnnotatedCondition` tree and a root score.
//! See spec §4.3.

use crate::almanac::Almanac;
use crate::condition::{
    AllCondition, AnnotatedAll, AnnotatedAny, AnnotatedCondition, AnnotatedLeaf, AnnotatedNot,
    AnnotatedReference, AnyCondition, Condition, LeafCondition, NotCondition, ReferenceCondition,
};
use crate::error::{Result, RuleForgeError};
use crate::registry::OperatorRegistry;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Evaluates condition trees against an almanac using a shared operator
/// registry and named-condition table. Cheap to clone — everything
/// inside is reference-counted, so spawned sibling tasks each hold
/// their own handle to the same registry and condition map.
#[derive(Clone)]
pub struct ConditionEvaluator {
    registry: Arc<OperatorRegistry>,
    named_conditions: Arc<DashMap<String, Condition>>,
}

impl ConditionEvaluator {
    pub fn new(registry: Arc<OperatorRegistry>, named_conditions: Arc<DashMap<String, Condition>>) -> Self {
        ConditionEvaluator { registry, named_conditions }
    }

    /// Evaluate `condition` against `almanac`, returning its annotated
    /// tree. Boxed because the tree walk is recursive and `all`/`any`
    /// nodes spawn their children as independent tasks.
    pub fn evaluate(
        self: Arc<Self>,
        condition: Condition,
        almanac: Arc<Almanac>,
    ) -> Pin<Box<dyn Future<Output = Result<AnnotatedCondition>> + Send>> {
        Box::pin(async move {
            match condition {
                Condition::Leaf(leaf) => self.evaluate_leaf(leaf, almanac).await,
                Condition::Not(not) => self.evaluate_not(not, almanac).await,
                Condition::All(all) => self.evaluate_all(all, almanac).await,
                Condition::Any(any) => self.evaluate_any(any, almanac).await,
                Condition::Reference(r) => self.evaluate_reference(r, almanac).await,
            }
        })
    }

    async fn evaluate_leaf(&self, leaf: LeafCondition, almanac: Arc<Almanac>) -> Result<AnnotatedCondition> {
        let value_result = almanac.get_value(&leaf.value).await?;
        let params = Arc::new(leaf.params.clone());
        let fact_result = almanac.fact_value(&leaf.fact, params, &leaf.path).await?;
        let operator = self.registry.get(&leaf.operator)?;
        let score = operator.run(&fact_result, &value_result);
        let result = score >= 1.0;

        Ok(AnnotatedCondition::Leaf(AnnotatedLeaf {
            fact: leaf.fact,
            operator: leaf.operator,
            value: leaf.value,
            path: leaf.path,
            params: leaf.params,
            weight: leaf.weight,
            priority: leaf.priority,
            name: leaf.name,
            score,
            result,
            fact_result,
            value_result,
        }))
    }

    async fn evaluate_not(self: &Arc<Self>, not: NotCondition, almanac: Arc<Almanac>) -> Result<AnnotatedCondition> {
        let child = self.clone().evaluate(*not.not, almanac).await?;
        let score = if child.score() < 1.0 { 1.0 } else { 0.0 };
        Ok(AnnotatedCondition::Not(AnnotatedNot {
            not: Box::new(child),
            weight: not.weight,
            priority: not.priority,
            name: not.name,
            score,
            result: score >= 1.0,
        }))
    }

    async fn evaluate_all(self: &Arc<Self>, all: AllCondition, almanac: Arc<Almanac>) -> Result<AnnotatedCondition> {
        let children = self.evaluate_children(all.all, &almanac).await?;
        let (score, result) = aggregate_all(&children);
        Ok(AnnotatedCondition::All(AnnotatedAll {
            all: children,
            weight: all.weight,
            priority: all.priority,
            name: all.name,
            score,
            result,
        }))
    }

    async fn evaluate_any(self: &Arc<Self>, any: AnyCondition, almanac: Arc<Almanac>) -> Result<AnnotatedCondition> {
        let children = self.evaluate_children(any.any, &almanac).await?;
        let (score, result) = aggregate_any(&children);
        Ok(AnnotatedCondition::Any(AnnotatedAny {
            any: children,
            weight: any.weight,
            priority: any.priority,
            name: any.name,
            score,
            result,
        }))
    }

    /// Evaluate a sibling group concurrently, issuing them in
    /// priority order (spec §4.3 "child ordering") while preserving the
    /// original authoring order in the returned tree — the aggregate
    /// algebra is order-independent, only issue order is meant to be
    /// observable (e.g. which cache fills happen first).
    async fn evaluate_children(
        self: &Arc<Self>,
        children: Vec<Condition>,
        almanac: &Arc<Almanac>,
    ) -> Result<Vec<AnnotatedCondition>> {
        if children.is_empty() {
            return Ok(Vec::new());
        }

        let order = priority_order(&children, almanac);
        let mut join_set = tokio::task::JoinSet::new();
        for idx in order {
            let evaluator = self.clone();
            let almanac = almanac.clone();
            let condition = children[idx].clone();
            join_set.spawn(async move { (idx, evaluator.evaluate(condition, almanac).await) });
        }

        let mut slots: Vec<Option<AnnotatedCondition>> = (0..children.len()).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (idx, outcome) = joined.map_err(|e| RuleForgeError::ListenerError(e.to_string()))?;
            slots[idx] = Some(outcome?);
        }

        Ok(slots.into_iter().map(|s| s.expect("every index spawned exactly once")).collect())
    }

    async fn evaluate_reference(
        self: &Arc<Self>,
        reference: ReferenceCondition,
        almanac: Arc<Almanac>,
    ) -> Result<AnnotatedCondition> {
        let resolved_condition = self.named_conditions.get(&reference.condition).map(|c| c.clone());
        match resolved_condition {
            Some(condition) => {
                let resolved = self.clone().evaluate(condition, almanac).await?;
                Ok(AnnotatedCondition::Reference(AnnotatedReference {
                    score: resolved.score(),
                    result: resolved.result(),
                    condition: reference.condition,
                    weight: reference.weight,
                    priority: reference.priority,
                    name: reference.name,
                    resolved: Some(Box::new(resolved)),
                }))
            }
            None if almanac.options().allow_undefined_conditions => {
                Ok(AnnotatedCondition::Reference(AnnotatedReference {
                    condition: reference.condition,
                    weight: reference.weight,
                    priority: reference.priority,
                    name: reference.name,
                    score: 0.0,
                    result: false,
                    resolved: None,
                }))
            }
            None => Err(RuleForgeError::UnknownCondition(reference.condition)),
        }
    }
}

/// Indices into `children`, stably sorted by descending priority: an
/// explicit `priority` on the child wins; otherwise a leaf inherits its
/// referenced fact's registered priority; otherwise 1.
fn priority_order(children: &[Condition], almanac: &Almanac) -> Vec<usize> {
    let mut order: Vec<usize> = (0..children.len()).collect();
    order.sort_by_key(|&idx| {
        let condition = &children[idx];
        let priority = condition.priority().unwrap_or_else(|| match condition {
            Condition::Leaf(leaf) => almanac.fact_priority(&leaf.fact).unwrap_or(1),
            _ => 1,
        });
        (std::cmp::Reverse(priority), idx)
    });
    order
}

/// `all`: weighted arithmetic mean; empty children score 1.
fn aggregate_all(children: &[AnnotatedCondition]) -> (f64, bool) {
    if children.is_empty() {
        return (1.0, true);
    }
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for child in children {
        let w = child.weight() as f64;
        weighted_sum += w * child.score();
        weight_total += w;
    }
    let score = weighted_sum / weight_total;
    (score, score >= 1.0)
}

/// `any`: the score of the child with the highest weighted score;
/// empty children score 0. Ties keep the first child in authoring
/// order, matching the strict `>` comparison below.
fn aggregate_any(children: &[AnnotatedCondition]) -> (f64, bool) {
    if children.is_empty() {
        return (0.0, false);
    }
    let mut best_idx = 0;
    let mut best_weighted = f64::MIN;
    for (idx, child) in children.iter().enumerate() {
        let weighted = child.weight() as f64 * child.score();
        if weighted > best_weighted {
            best_weighted = weighted;
            best_idx = idx;
        }
    }
    let score = children[best_idx].score();
    (score, score >= 1.0)
}
