//! The per-run fact environment: constant and dynamic facts, a
//! parameter-keyed memoization cache, and the ordered event/result log.
//! See spec §4.2.

use crate::config::EngineOptions;
use crate::error::{Result, RuleForgeError};
use crate::fact::{Fact, FactParams};
use crate::reference::ValueOrRef;
use crate::rule::{Event, EventOutcome, RuleResult};
use crate::value::Value;
use ahash::AHasher;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::trace;

/// In-flight or resolved memoization slot. Stored behind `Arc` so
/// concurrent callers requesting the same `(factId, params)` await the
/// *same* `OnceCell`, not independent computations — spec §4.2 invariant.
type MemoSlot = Arc<OnceCell<Value>>;

/// Per-run fact environment. One `Almanac` must not be reused across
/// runs (spec §4.2 invariant); the engine constructs a fresh one per
/// `RuleEngine::run`.
pub struct Almanac {
    options: EngineOptions,
    facts: DashMap<String, Fact>,
    cache: DashMap<u64, MemoSlot>,
    success_events: Mutex<Vec<Event>>,
    failure_events: Mutex<Vec<Event>>,
    results: Mutex<Vec<RuleResult>>,
}

impl Almanac {
    /// Construct an empty almanac with the given engine configuration.
    pub fn new(options: EngineOptions) -> Self {
        Almanac {
            options,
            facts: DashMap::new(),
            cache: DashMap::new(),
            success_events: Mutex::new(Vec::new()),
            failure_events: Mutex::new(Vec::new()),
            results: Mutex::new(Vec::new()),
        }
    }

    /// Register (or replace) a fact for the duration of this run.
    pub fn add_fact(&self, fact: Fact) {
        self.facts.insert(fact.id.clone(), fact);
    }

    /// Whether a fact with this id is registered on this almanac.
    pub fn has_fact(&self, fact_id: &str) -> bool {
        self.facts.contains_key(fact_id)
    }

    /// Resolve `factId`'s value for `params`, optionally projected
    /// through `path`. See spec §4.2 `fact-value`.
    pub async fn fact_value(
        self: &Arc<Self>,
        fact_id: &str,
        params: FactParams,
        path: &str,
    ) -> Result<Value> {
        let fact = match self.facts.get(fact_id) {
            Some(f) => f.clone(),
            None => {
                if self.options.allow_undefined_facts {
                    return Ok(Value::Null);
                }
                return Err(RuleForgeError::UndefinedFact(fact_id.to_string()));
            }
        };

        let resolved = if fact.is_constant() {
            fact.evaluate(params, self.clone()).await?
        } else if fact.cache {
            let key = cache_key(fact_id, &params);
            let slot = self
                .cache
                .entry(key)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone();

            let already_initialized = slot.initialized();
            let value = slot
                .get_or_try_init(|| async {
                    fact.evaluate(params.clone(), self.clone())
                        .await
                        .map_err(|e| e.to_string())
                })
                .await
                .map_err(RuleForgeError::FactComputation)?
                .clone();

            trace!(fact = fact_id, hit = already_initialized, "almanac cache lookup");
            value
        } else {
            fact.evaluate(params, self.clone()).await?
        };

        if path.is_empty() {
            Ok(resolved)
        } else {
            match resolved {
                Value::Object(_) | Value::Array(_) => Ok(resolved.project(path).unwrap_or(Value::Null)),
                _ => Ok(resolved),
            }
        }
    }

    /// Resolve a leaf `value` or event param entry uniformly: literals
    /// pass through, fact references are looked up via `fact_value`.
    pub async fn get_value(self: &Arc<Self>, value: &ValueOrRef) -> Result<Value> {
        match value {
            ValueOrRef::Literal(v) => Ok(v.clone()),
            ValueOrRef::FactRef(r) => {
                self.fact_value(&r.fact, Arc::new(r.params.clone()), &r.path)
                    .await
            }
        }
    }

    /// Append an event to the appropriate ordered log.
    pub fn add_event(&self, event: Event, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Success => self.success_events.lock().push(event),
            EventOutcome::Failure => self.failure_events.lock().push(event),
        }
    }

    /// Read back events. `None` returns both logs concatenated
    /// (success first, then failure), preserving each log's insertion
    /// order.
    pub fn get_events(&self, outcome: Option<EventOutcome>) -> Vec<Event> {
        match outcome {
            Some(EventOutcome::Success) => self.success_events.lock().clone(),
            Some(EventOutcome::Failure) => self.failure_events.lock().clone(),
            None => {
                let mut all = self.success_events.lock().clone();
                all.extend(self.failure_events.lock().clone());
                all
            }
        }
    }

    /// Append a rule result to the ordered result log.
    pub fn add_result(&self, result: RuleResult) {
        self.results.lock().push(result);
    }

    /// Read back all rule results in settlement order.
    pub fn get_results(&self) -> Vec<RuleResult> {
        self.results.lock().clone()
    }

    /// The options this almanac was constructed with.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// A registered fact's evaluation-order priority, if known. Used by
    /// the evaluator to order `all`/`any` children whose own `priority`
    /// was not set explicitly (spec §4.3 "child ordering").
    pub fn fact_priority(&self, fact_id: &str) -> Option<u32> {
        self.facts.get(fact_id).map(|f| f.priority)
    }
}

fn cache_key(fact_id: &str, params: &FactParams) -> u64 {
    let mut hasher = AHasher::default();
    fact_id.hash(&mut hasher);
    for (k, v) in params.iter() {
        k.hash(&mut hasher);
        v.canonical_key().hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn constant_fact_resolves() {
        let almanac = Arc::new(Almanac::new(EngineOptions::default()));
        almanac.add_fact(Fact::constant("x", Value::number(3.0)));
        let v = almanac
            .fact_value("x", Arc::new(BTreeMap::new()), "")
            .await
            .unwrap();
        assert_eq!(v, Value::number(3.0));
    }

    #[tokio::test]
    async fn undefined_fact_errors_by_default() {
        let almanac = Arc::new(Almanac::new(EngineOptions::default()));
        let err = almanac
            .fact_value("missing", Arc::new(BTreeMap::new()), "")
            .await
            .unwrap_err();
        assert!(matches!(err, RuleForgeError::UndefinedFact(_)));
    }

    #[tokio::test]
    async fn undefined_fact_is_null_when_allowed() {
        let mut options = EngineOptions::default();
        options.allow_undefined_facts = true;
        let almanac = Arc::new(Almanac::new(options));
        let v = almanac
            .fact_value("missing", Arc::new(BTreeMap::new()), "")
            .await
            .unwrap();
        assert_eq!(v, Value::Null);
    }

    #[tokio::test]
    async fn dynamic_fact_computed_once_per_params_under_concurrency() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let almanac = Arc::new(Almanac::new(EngineOptions::default()));
        almanac.add_fact(Fact::dynamic(
            "expensive",
            Arc::new(move |_params, _almanac| {
                let calls = calls_clone.clone();
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Ok(Value::number(42.0))
                })
            }),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let almanac = almanac.clone();
            handles.push(tokio::spawn(async move {
                almanac
                    .fact_value("expensive", Arc::new(BTreeMap::new()), "")
                    .await
                    .unwrap()
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), Value::number(42.0));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_params_compute_independently() {
        let almanac = Arc::new(Almanac::new(EngineOptions::default()));
        almanac.add_fact(Fact::dynamic(
            "echo",
            Arc::new(|params, _almanac| {
                Box::pin(async move {
                    let n = params.get("n").and_then(Value::as_f64).unwrap_or(0.0);
                    Ok(Value::number(n * 2.0))
                })
            }),
        ));

        let mut p1 = BTreeMap::new();
        p1.insert("n".to_string(), Value::number(1.0));
        let mut p2 = BTreeMap::new();
        p2.insert("n".to_string(), Value::number(2.0));

        let v1 = almanac.fact_value("echo", Arc::new(p1), "").await.unwrap();
        let v2 = almanac.fact_value("echo", Arc::new(p2), "").await.unwrap();
        assert_eq!(v1, Value::number(2.0));
        assert_eq!(v2, Value::number(4.0));
    }

    #[tokio::test]
    async fn path_projects_object_values() {
        let almanac = Arc::new(Almanac::new(EngineOptions::default()));
        almanac.add_fact(Fact::constant(
            "profile",
            Value::object(BTreeMap::from([(
                "age".to_string(),
                Value::number(30.0),
            )])),
        ));
        let v = almanac
            .fact_value("profile", Arc::new(BTreeMap::new()), "age")
            .await
            .unwrap();
        assert_eq!(v, Value::number(30.0));
    }

    #[test]
    fn events_preserve_insertion_order() {
        let almanac = Almanac::new(EngineOptions::default());
        almanac.add_event(Event::new("a"), EventOutcome::Success);
        almanac.add_event(Event::new("b"), EventOutcome::Success);
        let events = almanac.get_events(Some(EventOutcome::Success));
        assert_eq!(events[0].event_type, "a");
        assert_eq!(events[1].event_type, "b");
    }
}
