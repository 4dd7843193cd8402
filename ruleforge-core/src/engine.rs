//! The rule engine: owns rules, facts, the operator registry and named
//! conditions; drives priority-bucketed evaluation runs. See spec §4.4.

use crate::almanac::Almanac;
use crate::condition::Condition;
use crate::config::EngineOptions;
use crate::decorator::Decorator;
use crate::error::{Result, RuleForgeError};
use crate::evaluator::ConditionEvaluator;
use crate::fact::Fact;
use crate::operator::Operator;
use crate::registry::OperatorRegistry;
use crate::rule::{Event, EventOutcome, HandlerFuture, Rule, RuleResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Engine lifecycle, per spec §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Ready,
    Running,
    Finished,
}

/// A handler subscribed to `"success"`, `"failure"`, or a specific
/// event type, fired for every rule that reaches that outcome.
pub type EventHandler = Arc<dyn Fn(Event, Arc<Almanac>) -> HandlerFuture + Send + Sync>;

/// Optional overrides for a single `run` invocation.
#[derive(Default)]
pub struct RunOptions {
    /// Supply a pre-built almanac (e.g. one already seeded by a prior
    /// classification) instead of constructing a fresh one.
    pub almanac: Option<Arc<Almanac>>,
}

/// The bundle a settled run returns, per spec §6.
pub struct RunOutcome {
    pub results: Vec<RuleResult>,
    pub failure_results: Vec<RuleResult>,
    pub events: Vec<Event>,
    pub failure_events: Vec<Event>,
    pub almanac: Arc<Almanac>,
}

/// Owns the rule set, fact registrations, operator/decorator tables and
/// named conditions, and drives `run`. See spec §4.4.
pub struct RuleEngine {
    status: Mutex<EngineStatus>,
    rules: Mutex<Vec<Rule>>,
    registry: Arc<OperatorRegistry>,
    named_conditions: Arc<DashMap<String, Condition>>,
    facts: DashMap<String, Fact>,
    handlers: DashMap<String, Mutex<Vec<EventHandler>>>,
    options: EngineOptions,
}

impl RuleEngine {
    /// Build an engine with the built-in operators/decorators and the
    /// given configuration.
    pub fn new(options: EngineOptions) -> Self {
        RuleEngine {
            status: Mutex::new(EngineStatus::Ready),
            rules: Mutex::new(Vec::new()),
            registry: Arc::new(OperatorRegistry::new()),
            named_conditions: Arc::new(DashMap::new()),
            facts: DashMap::new(),
            handlers: DashMap::new(),
            options,
        }
    }

    /// Build an engine sharing an existing operator registry and named
    /// condition table but starting with no rules, facts or listeners
    /// of its own. Used by the validation engine to isolate a
    /// classification run from the real engine's state (spec §4.5).
    pub(crate) fn with_shared_registry(
        options: EngineOptions,
        registry: Arc<OperatorRegistry>,
        named_conditions: Arc<DashMap<String, Condition>>,
    ) -> Self {
        RuleEngine {
            status: Mutex::new(EngineStatus::Ready),
            rules: Mutex::new(Vec::new()),
            registry,
            named_conditions,
            facts: DashMap::new(),
            handlers: DashMap::new(),
            options,
        }
    }

    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Flip status to `Finished`. The engine checks this between
    /// priority buckets; in-flight evaluations in the current bucket
    /// are not forcibly cancelled (spec §5).
    pub fn stop(&self) {
        *self.status.lock() = EngineStatus::Finished;
    }

    pub fn add_rule(&self, rule: Rule) {
        self.rules.lock().push(rule);
    }

    /// Replace every rule sharing `rule`'s name with `rule` itself,
    /// appending it if none matched.
    pub fn update_rule(&self, rule: Rule) {
        let mut rules = self.rules.lock();
        rules.retain(|r| r.name != rule.name);
        rules.push(rule);
    }

    /// Remove every rule with this name; returns whether any were
    /// removed.
    pub fn remove_rule(&self, name: &str) -> bool {
        let mut rules = self.rules.lock();
        let before = rules.len();
        rules.retain(|r| r.name != name);
        rules.len() != before
    }

    pub fn rule_count(&self) -> usize {
        self.rules.lock().len()
    }

    pub fn set_condition(&self, name: impl Into<String>, condition: Condition) -> Result<()> {
        condition.validate()?;
        self.named_conditions.insert(name.into(), condition);
        Ok(())
    }

    pub fn remove_condition(&self, name: &str) -> bool {
        self.named_conditions.remove(name).is_some()
    }

    /// Register (or replace) a fact the engine re-seeds into every
    /// run's almanac.
    pub fn add_fact(&self, fact: Fact) {
        self.facts.insert(fact.id.clone(), fact);
    }

    pub fn remove_fact(&self, fact_id: &str) -> bool {
        self.facts.remove(fact_id).is_some()
    }

    pub fn get_fact(&self, fact_id: &str) -> Option<Fact> {
        self.facts.get(fact_id).map(|f| f.clone())
    }

    pub fn add_operator(&self, operator: Operator) {
        self.registry.add_operator(operator);
    }

    pub fn remove_operator(&self, name: &str) -> bool {
        self.registry.remove_operator(name)
    }

    pub fn add_decorator(&self, decorator: Decorator) {
        self.registry.add_decorator(decorator);
    }

    pub fn remove_decorator(&self, name: &str) -> bool {
        self.registry.remove_decorator(name)
    }

    /// Subscribe `handler` to `"success"`, `"failure"`, or a specific
    /// event type. Multiple handlers on the same name are invoked in
    /// registration order.
    pub fn on(&self, event_name: impl Into<String>, handler: EventHandler) {
        self.handlers
            .entry(event_name.into())
            .or_insert_with(|| Mutex::new(Vec::new()))
            .lock()
            .push(handler);
    }

    /// The shared operator registry. Exposed so the validation engine
    /// can build temporary engines from a copy of the same operators
    /// (spec §4.5 isolation).
    pub(crate) fn registry(&self) -> Arc<OperatorRegistry> {
        self.registry.clone()
    }

    pub(crate) fn named_conditions(&self) -> Arc<DashMap<String, Condition>> {
        self.named_conditions.clone()
    }

    pub(crate) fn rules_snapshot(&self) -> Vec<Rule> {
        self.rules.lock().clone()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run every registered rule against `runtime_facts` layered over
    /// the engine's registered facts. See spec §4.4 for the algorithm.
    #[instrument(skip(self, runtime_facts, run_options), fields(rule_count = self.rule_count()))]
    pub async fn run(&self, runtime_facts: Vec<Fact>, run_options: RunOptions) -> Result<RunOutcome> {
        *self.status.lock() = EngineStatus::Running;

        let almanac = run_options
            .almanac
            .unwrap_or_else(|| Arc::new(Almanac::new(self.options.clone())));

        for fact in self.facts.iter() {
            almanac.add_fact(fact.clone());
        }
        for fact in runtime_facts {
            almanac.add_fact(fact);
        }

        let buckets = priority_buckets(self.rules_snapshot());
        debug!(bucket_count = buckets.len(), "partitioned rules into priority buckets");

        'buckets: for (priority, bucket) in buckets {
            if self.status() == EngineStatus::Finished {
                debug!(priority, "engine stopped, skipping remaining buckets");
                break 'buckets;
            }
            trace!(priority, rules_in_bucket = bucket.len(), "evaluating priority bucket");

            let mut join_set = tokio::task::JoinSet::new();
            for rule in bucket {
                let evaluator = Arc::new(ConditionEvaluator::new(
                    self.registry.clone(),
                    self.named_conditions.clone(),
                ));
                let almanac = almanac.clone();
                let handlers = self.snapshot_handlers();
                let options = self.options.clone();
                join_set.spawn(async move {
                    evaluate_rule(evaluator, rule, almanac, handlers, options).await
                });
            }

            while let Some(joined) = join_set.join_next().await {
                joined.map_err(|e| RuleForgeError::ListenerError(e.to_string()))??;
            }
        }

        *self.status.lock() = EngineStatus::Finished;

        let all_results = almanac.get_results();
        let (results, failure_results): (Vec<_>, Vec<_>) =
            all_results.into_iter().partition(|r| r.result);
        let events = almanac.get_events(Some(EventOutcome::Success));
        let failure_events = almanac.get_events(Some(EventOutcome::Failure));

        Ok(RunOutcome { results, failure_results, events, failure_events, almanac })
    }

    fn snapshot_handlers(&self) -> BTreeMap<String, Vec<EventHandler>> {
        self.handlers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().lock().clone()))
            .collect()
    }
}

/// Group rules by priority (highest first), preserving insertion order
/// within a bucket.
fn priority_buckets(rules: Vec<Rule>) -> Vec<(u32, Vec<Rule>)> {
    let mut buckets: BTreeMap<Reverse<u32>, Vec<Rule>> = BTreeMap::new();
    for rule in rules {
        buckets.entry(Reverse(rule.priority)).or_default().push(rule);
    }
    buckets.into_iter().map(|(Reverse(priority), rules)| (priority, rules)).collect()
}

/// Evaluate one rule end to end: walk its conditions, build the
/// `RuleResult`, append it and its events to the almanac, then fire
/// handlers sequentially for this rule (spec §4.4 step 5, §5 emission
/// ordering).
async fn evaluate_rule(
    evaluator: Arc<ConditionEvaluator>,
    rule: Rule,
    almanac: Arc<Almanac>,
    handlers: BTreeMap<String, Vec<EventHandler>>,
    options: EngineOptions,
) -> Result<()> {
    let tree = evaluator.evaluate(rule.conditions.clone(), almanac.clone()).await?;
    let score = tree.score();
    let passed = tree.result();

    let mut event = rule.event.clone();
    if options.replace_facts_in_event_params {
        let mut resolved = BTreeMap::new();
        for (key, value_or_ref) in &event.params {
            let resolved_value = almanac.get_value(value_or_ref).await?;
            resolved.insert(key.clone(), resolved_value.into());
        }
        event.params = resolved;
    }

    let result = RuleResult {
        name: rule.name.clone(),
        priority: rule.priority,
        event: event.clone(),
        result: passed,
        score,
        conditions: tree,
    };
    almanac.add_result(result);

    // On success the almanac records the event twice: once for the
    // generic "success" notification, once for the type-named emission
    // (spec §4.4 step 5). A failure only ever gets the one emission.
    let outcome = if passed { EventOutcome::Success } else { EventOutcome::Failure };
    almanac.add_event(event.clone(), outcome);
    if passed {
        almanac.add_event(event.clone(), outcome);
    }

    let outcome_channel = if passed { "success" } else { "failure" };
    fire_channel(&handlers, outcome_channel, event.clone(), almanac.clone()).await?;
    fire_channel(&handlers, &event.event_type, event.clone(), almanac.clone()).await?;

    if passed {
        if let Some(handler) = &rule.on_success {
            handler(event, almanac).await?;
        }
    } else if let Some(handler) = &rule.on_failure {
        handler(event, almanac).await?;
    }

    Ok(())
}

async fn fire_channel(
    handlers: &BTreeMap<String, Vec<EventHandler>>,
    channel: &str,
    event: Event,
    almanac: Arc<Almanac>,
) -> Result<()> {
    if let Some(subscribers) = handlers.get(channel) {
        for handler in subscribers {
            handler(event.clone(), almanac.clone()).await?;
        }
    }
    Ok(())
}
