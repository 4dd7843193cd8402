//! Validation-engine classification scenarios (spec §8 scenarios 5-6),
//! plus multi-rule summary accounting and a custom default-value
//! provider, all driven through the public API.

use ruleforge_core::{EngineOptions, Rule, Value, ValidationEngine};

fn rule(json: &str) -> Rule {
    Rule::from_json(json).unwrap()
}

#[tokio::test]
async fn scenario_5_partial_satisfaction_with_missing_facts() {
    let engine = ValidationEngine::new(EngineOptions::default());
    engine.add_rule(rule(
        r#"{
            "conditions": { "all": [
                { "fact": "storeId", "operator": "equal", "value": "X" },
                { "fact": "controlService", "operator": "equal", "value": 99 }
            ]},
            "event": { "type": "storeQualifies" }
        }"#,
    ));

    let result = engine
        .find_satisfied_rules(super::facts(vec![("storeId", Value::string("X"))]), None)
        .await;

    assert_eq!(result.partially_satisfied_rules.len(), 1);
    let classification = &result.partially_satisfied_rules[0];
    assert_eq!(classification.reason, "partially_satisfied_missing_facts");
    assert_eq!(
        classification.missing_facts.as_ref().unwrap().get("controlService"),
        Some(&Value::number(99.0))
    );
}

#[tokio::test]
async fn scenario_6_unrelated_rule_is_independent() {
    let engine = ValidationEngine::new(EngineOptions::default());
    engine.add_rule(rule(
        r#"{
            "conditions": { "all": [
                { "fact": "storeId", "operator": "equal", "value": "X" },
                { "fact": "controlService", "operator": "equal", "value": 99 }
            ]},
            "event": { "type": "storeQualifies" }
        }"#,
    ));
    engine.add_rule(rule(
        r#"{
            "conditions": { "fact": "date", "operator": "greaterThan", "value": "2025-06-30" },
            "event": { "type": "dated" }
        }"#,
    ));

    let result = engine
        .find_satisfied_rules(super::facts(vec![("storeId", Value::string("X"))]), None)
        .await;

    assert_eq!(result.independent_rules.len(), 1);
    assert_eq!(result.independent_rules[0].reason, "independent_and_satisfied");
    assert_eq!(result.summary.total_rules, 2);
    assert_eq!(result.summary.independent, 1);
    assert_eq!(result.summary.partially_satisfied, 1);
}

#[tokio::test]
async fn summary_partitions_every_rule_exactly_once() {
    let engine = ValidationEngine::new(EngineOptions::default());
    engine.add_rule(rule(r#"{
        "conditions": { "fact": "a", "operator": "equal", "value": 1 },
        "event": { "type": "fully" }
    }"#));
    engine.add_rule(rule(r#"{
        "conditions": { "fact": "a", "operator": "equal", "value": 2 },
        "event": { "type": "unsatisfied" }
    }"#));
    engine.add_rule(rule(r#"{
        "conditions": { "fact": "b", "operator": "equal", "value": 1 },
        "event": { "type": "independent" }
    }"#));
    engine.add_rule(rule(r#"{
        "conditions": { "all": [
            { "fact": "a", "operator": "equal", "value": 1 },
            { "fact": "c", "operator": "equal", "value": 1 }
        ]},
        "event": { "type": "partial" }
    }"#));

    let result = engine.find_satisfied_rules(super::facts(vec![("a", Value::number(1.0))]), None).await;

    let total = result.summary.fully_satisfied
        + result.summary.partially_satisfied
        + result.summary.independent
        + result.summary.unsatisfied;
    assert_eq!(total, result.summary.total_rules);
    assert_eq!(result.summary.total_rules, 4);
    assert_eq!(result.summary.fully_satisfied, 1);
    assert_eq!(result.summary.unsatisfied, 1);
    assert_eq!(result.summary.independent, 1);
    assert_eq!(result.summary.partially_satisfied, 1);
}

#[tokio::test]
async fn custom_default_value_provider_overrides_the_built_in_table() {
    let engine = ValidationEngine::new(EngineOptions::default());
    engine.add_rule(rule(r#"{
        "conditions": { "fact": "threshold", "operator": "greaterThan", "value": 50 },
        "event": { "type": "overThreshold" }
    }"#));

    engine.register_default_value_provider(
        "greaterThan",
        std::sync::Arc::new(|threshold, _leaf| {
            Value::number(threshold.as_f64().unwrap_or(0.0) + 1000.0)
        }),
    );

    let result = engine.find_satisfied_rules(std::collections::BTreeMap::new(), None).await;
    assert_eq!(result.partially_satisfied_rules.len(), 1);
    assert_eq!(
        result.partially_satisfied_rules[0].missing_facts.as_ref().unwrap().get("threshold"),
        Some(&Value::number(1050.0))
    );
}

#[tokio::test]
async fn sugar_methods_match_the_general_call() {
    let engine = ValidationEngine::new(EngineOptions::default());
    engine.add_rule(rule(r#"{
        "conditions": { "all": [
            { "fact": "storeId", "operator": "equal", "value": "X" },
            { "fact": "controlService", "operator": "equal", "value": 99 }
        ]},
        "event": { "type": "storeQualifies" }
    }"#));

    let via_sugar = engine
        .find_partially_satisfied_rules("storeId", Value::string("X"), std::collections::BTreeMap::new())
        .await;
    let via_general = engine
        .find_satisfied_rules(super::facts(vec![("storeId", Value::string("X"))]), Some("storeId"))
        .await;

    assert_eq!(via_sugar.partially_satisfied_rules.len(), via_general.partially_satisfied_rules.len());
}
