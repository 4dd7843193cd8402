//! Integration tests for the ruleforge CLI commands.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const SIMPLE_RULE: &str = r#"[{
    "name": "overDrawn",
    "conditions": { "fact": "balance", "operator": "lessThan", "value": 0 },
    "event": { "type": "overDrawn" }
}]"#;

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("ruleforge").unwrap();
    cmd.arg("--version").assert().success().stdout(predicate::str::contains("ruleforge"));
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("ruleforge").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("eval"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_eval_text_format() {
    let rules = write_temp(SIMPLE_RULE);
    let facts = write_temp(r#"{ "balance": -10 }"#);

    let mut cmd = Command::cargo_bin("ruleforge").unwrap();
    cmd.arg("eval")
        .arg("--rules").arg(rules.path())
        .arg("--facts").arg(facts.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS"))
        .stdout(predicate::str::contains("overDrawn"));
}

#[test]
fn test_eval_json_format() {
    let rules = write_temp(SIMPLE_RULE);
    let facts = write_temp(r#"{ "balance": 10 }"#);

    let mut cmd = Command::cargo_bin("ruleforge").unwrap();
    cmd.arg("eval")
        .arg("--rules").arg(rules.path())
        .arg("--facts").arg(facts.path())
        .arg("--format").arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("failureResults"));
}

#[test]
fn test_eval_missing_fact_errors_by_default() {
    let rules = write_temp(SIMPLE_RULE);
    let facts = write_temp("{}");

    let mut cmd = Command::cargo_bin("ruleforge").unwrap();
    cmd.arg("eval")
        .arg("--rules").arg(rules.path())
        .arg("--facts").arg(facts.path())
        .assert()
        .failure();
}

#[test]
fn test_eval_allow_undefined_facts() {
    let rules = write_temp(SIMPLE_RULE);
    let facts = write_temp("{}");

    let mut cmd = Command::cargo_bin("ruleforge").unwrap();
    cmd.arg("eval")
        .arg("--rules").arg(rules.path())
        .arg("--facts").arg(facts.path())
        .arg("--allow-undefined-facts")
        .assert()
        .success();
}

#[test]
fn test_validate_reports_satisfaction_rate() {
    let rules = write_temp(SIMPLE_RULE);
    let facts = write_temp("{}");

    let mut cmd = Command::cargo_bin("ruleforge").unwrap();
    cmd.arg("validate")
        .arg("--rules").arg(rules.path())
        .arg("--facts").arg(facts.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("satisfaction rate"));
}

#[test]
fn test_check_reports_round_trip_success() {
    let rules = write_temp(SIMPLE_RULE);

    let mut cmd = Command::cargo_bin("ruleforge").unwrap();
    cmd.arg("check")
        .arg(rules.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("round-trip cleanly"));
}

#[test]
fn test_check_reports_parse_failure() {
    let rules = write_temp("not valid json");

    let mut cmd = Command::cargo_bin("ruleforge").unwrap();
    cmd.arg("check")
        .arg(rules.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("failed to parse"));
}
