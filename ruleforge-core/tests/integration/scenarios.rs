//! The six concrete scenarios from spec §8, driven end to end through
//! JSON rule definitions and a real `RuleEngine::run`.

use ruleforge_core::{EngineOptions, Fact, Rule, RuleEngine, RunOptions, Value};

fn engine_with_rule_json(json: &str) -> RuleEngine {
    let engine = RuleEngine::new(EngineOptions::default());
    engine.add_rule(Rule::from_json(json).unwrap());
    engine
}

#[tokio::test]
async fn scenario_1_boolean_foul_out() {
    let rule_json = r#"{
        "name": "fouledOut",
        "conditions": {
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
        },
        "event": { "type": "fouledOut" }
    }"#;
    let engine = engine_with_rule_json(rule_json);

    let passing = vec![
        Fact::constant("gameDuration", Value::number(40.0)),
        Fact::constant("personalFoulCount", Value::number(6.0)),
    ];
    let outcome = engine.run(passing, RunOptions::default()).await.unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results[0].score >= 1.0);
    // "success" emission plus the type-named emission.
    assert_eq!(outcome.events.len(), 2);
    assert_eq!(outcome.events[1].event_type, "fouledOut");

    let failing = vec![
        Fact::constant("gameDuration", Value::number(40.0)),
        Fact::constant("personalFoulCount", Value::number(4.0)),
    ];
    let outcome = engine.run(failing, RunOptions::default()).await.unwrap();
    assert_eq!(outcome.failure_results.len(), 1);
    assert!(!outcome.failure_results[0].result);
}

#[tokio::test]
async fn scenario_2_weighted_average() {
    let rule_json = r#"{
        "conditions": { "all": [
            { "fact": "performance", "operator": "equal", "value": 100, "weight": 3 },
            { "fact": "attendance", "operator": "equal", "value": 100, "weight": 1 }
        ]},
        "event": { "type": "bonus" }
    }"#;
    let engine = engine_with_rule_json(rule_json);

    let facts = vec![
        Fact::constant("performance", Value::number(100.0)),
        Fact::constant("attendance", Value::number(0.0)),
    ];
    let outcome = engine.run(facts, RunOptions::default()).await.unwrap();
    assert_eq!(outcome.failure_results.len(), 1);
    assert!((outcome.failure_results[0].score - 0.75).abs() < 1e-9);
}

#[tokio::test]
async fn scenario_3_weighted_max_for_any() {
    let rule_json = r#"{
        "conditions": { "any": [
            { "fact": "skill1", "operator": "equal", "value": "expert", "weight": 2 },
            { "fact": "skill2", "operator": "equal", "value": "expert", "weight": 1 }
        ]},
        "event": { "type": "promote" }
    }"#;
    let engine = engine_with_rule_json(rule_json);

    let facts = vec![
        Fact::constant("skill1", Value::string("expert")),
        Fact::constant("skill2", Value::string("novice")),
    ];
    let outcome = engine.run(facts, RunOptions::default()).await.unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].score, 1.0);
}

#[tokio::test]
async fn scenario_4_exponential_gradient() {
    let rule_json = r#"{
        "conditions": { "fact": "score", "operator": "greaterThan", "value": 80 },
        "event": { "type": "highScore" }
    }"#;
    let engine = engine_with_rule_json(rule_json);

    let facts = vec![Fact::constant("score", Value::number(81.0))];
    let outcome = engine.run(facts, RunOptions::default()).await.unwrap();
    assert_eq!(outcome.failure_results.len(), 1);
    let score = outcome.failure_results[0].score;
    assert!(score < 1.0 && score > 0.999, "score was {score}");

    let facts = vec![Fact::constant("score", Value::number(330.0))];
    let outcome = engine.run(facts, RunOptions::default()).await.unwrap();
    let score = outcome.failure_results[0].score;
    assert!((score - std::f64::consts::E.recip()).abs() < 1e-3, "score was {score}");
}

#[tokio::test]
async fn rule_round_trips_through_json_with_identical_scores() {
    let rule_json = r#"{
        "name": "roundTrip",
        "priority": 3,
        "conditions": { "all": [
            { "fact": "x", "operator": "greaterThanInclusive", "value": 10 },
            { "fact": "y", "operator": "in", "value": [1, 2, 3] }
        ]},
        "event": { "type": "go", "params": { "note": "hi" } }
    }"#;

    let rule = Rule::from_json(rule_json).unwrap();
    let serialized = serde_json::to_string(&rule).unwrap();
    let reloaded = Rule::from_json(&serialized).unwrap();

    let facts = || {
        vec![
            Fact::constant("x", Value::number(10.0)),
            Fact::constant("y", Value::number(2.0)),
        ]
    };

    let original_engine = RuleEngine::new(EngineOptions::default());
    original_engine.add_rule(rule);
    let original_outcome = original_engine.run(facts(), RunOptions::default()).await.unwrap();

    let reloaded_engine = RuleEngine::new(EngineOptions::default());
    reloaded_engine.add_rule(reloaded);
    let reloaded_outcome = reloaded_engine.run(facts(), RunOptions::default()).await.unwrap();

    assert_eq!(original_outcome.results.len(), reloaded_outcome.results.len());
    assert_eq!(original_outcome.results[0].score, reloaded_outcome.results[0].score);
    assert_eq!(original_outcome.results[0].priority, reloaded_outcome.results[0].priority);
}

#[tokio::test]
async fn run_is_idempotent_for_the_same_facts() {
    let rule_json = r#"{
        "conditions": { "fact": "x", "operator": "equal", "value": 1 },
        "event": { "type": "go" }
    }"#;
    let engine = engine_with_rule_json(rule_json);

    let first = engine.run(vec![Fact::constant("x", Value::number(1.0))], RunOptions::default()).await.unwrap();
    let second = engine.run(vec![Fact::constant("x", Value::number(1.0))], RunOptions::default()).await.unwrap();

    assert_eq!(first.results.len(), second.results.len());
    assert_eq!(first.results[0].score, second.results[0].score);
    assert_eq!(first.events.len(), second.events.len());
}
