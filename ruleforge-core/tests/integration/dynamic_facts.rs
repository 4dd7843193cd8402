//! End-to-end coverage for dynamic facts, path projection, decorator
//! chains and event-param fact resolution driven through a full
//! `RuleEngine::run`.

use ruleforge_core::{Almanac, EngineOptions, Fact, Rule, RuleEngine, RunOptions, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn dynamic_fact_computed_once_per_run_even_when_referenced_by_two_rules() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_for_closure = calls.clone();

    let engine = RuleEngine::new(EngineOptions::default());
    engine.add_fact(Fact::dynamic(
        "accountBalance",
        Arc::new(move |_params, _almanac: Arc<Almanac>| {
            let calls = calls_for_closure.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::number(500.0))
            })
        }),
    ));

    engine.add_rule(Rule::from_json(
        r#"{ "conditions": { "fact": "accountBalance", "operator": "greaterThan", "value": 100 }, "event": { "type": "overDrawn" } }"#,
    ).unwrap());
    engine.add_rule(Rule::from_json(
        r#"{ "conditions": { "fact": "accountBalance", "operator": "lessThan", "value": 1000 }, "event": { "type": "underLimit" } }"#,
    ).unwrap());

    let outcome = engine.run(vec![], RunOptions::default()).await.unwrap();
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn leaf_path_projects_nested_fact_value() {
    let engine = RuleEngine::new(EngineOptions::default());
    engine.add_rule(Rule::from_json(
        r#"{ "conditions": { "fact": "profile", "operator": "greaterThanInclusive", "value": 21, "path": "age" }, "event": { "type": "adult" } }"#,
    ).unwrap());

    let profile = Value::object(BTreeMap::from([("age".to_string(), Value::number(30.0))]));
    let outcome = engine.run(vec![Fact::constant("profile", profile)], RunOptions::default()).await.unwrap();
    assert_eq!(outcome.results.len(), 1);
}

#[tokio::test]
async fn every_fact_decorator_lifts_array_lhs_through_the_engine() {
    let engine = RuleEngine::new(EngineOptions::default());
    engine.add_rule(Rule::from_json(
        r#"{ "conditions": { "fact": "scores", "operator": "everyFact:greaterThanInclusive", "value": 60 }, "event": { "type": "allPassed" } }"#,
    ).unwrap());

    let scores = Value::array(vec![Value::number(60.0), Value::number(90.0)]);
    let outcome = engine.run(vec![Fact::constant("scores", scores)], RunOptions::default()).await.unwrap();
    assert_eq!(outcome.results.len(), 1);

    let scores = Value::array(vec![Value::number(10.0), Value::number(90.0)]);
    let outcome = engine.run(vec![Fact::constant("scores", scores)], RunOptions::default()).await.unwrap();
    assert_eq!(outcome.failure_results.len(), 1);
}

#[tokio::test]
async fn fact_to_fact_comparison_resolves_both_sides() {
    let engine = RuleEngine::new(EngineOptions::default());
    engine.add_rule(Rule::from_json(
        r#"{
            "conditions": { "fact": "balance", "operator": "greaterThanInclusive", "value": { "fact": "minimumBalance" } },
            "event": { "type": "sufficientFunds" }
        }"#,
    ).unwrap());

    let facts = vec![
        Fact::constant("balance", Value::number(500.0)),
        Fact::constant("minimumBalance", Value::number(250.0)),
    ];
    let outcome = engine.run(facts, RunOptions::default()).await.unwrap();
    assert_eq!(outcome.results.len(), 1);
}

#[tokio::test]
async fn replace_facts_in_event_params_resolves_references_before_emission() {
    let mut options = EngineOptions::default();
    options.replace_facts_in_event_params = true;
    let engine = RuleEngine::new(options);

    engine.add_rule(Rule::from_json(
        r#"{
            "conditions": { "fact": "accountBalance", "operator": "greaterThan", "value": 100 },
            "event": { "type": "overDrawn", "params": { "balance": { "fact": "accountBalance" } } }
        }"#,
    ).unwrap());

    let outcome = engine
        .run(vec![Fact::constant("accountBalance", Value::number(500.0))], RunOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 1);
    let resolved = outcome.results[0].event.params.get("balance").unwrap();
    match resolved {
        ruleforge_core::ValueOrRef::Literal(v) => assert_eq!(*v, Value::number(500.0)),
        ruleforge_core::ValueOrRef::FactRef(_) => panic!("expected the reference to have been resolved"),
    }
}
