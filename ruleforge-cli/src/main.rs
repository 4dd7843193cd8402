//! `ruleforge` — a thin command-line wrapper over `ruleforge-core`.
//!
//! Demonstration CLI only: loads a rules file and a facts file, then
//! either runs the engine (`eval`), classifies the rules against a
//! partial fact set (`validate`), or just parses/round-trips the rules
//! file (`check`). The wire format for both files is plain JSON — see
//! spec §6 for the rule shape; facts files are a flat JSON object
//! mapping `factId -> value`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use ruleforge_core::{EngineOptions, Fact, Rule, RuleEngine, RunOptions, Value, ValidationEngine};
use std::collections::BTreeMap;
use std::fs;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "ruleforge")]
#[command(about = "Evaluate weighted, declarative JSON rules against a set of facts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every rule in a rules file against a facts file.
    Eval {
        /// Path to a JSON array of rules.
        #[arg(short, long)]
        rules: String,

        /// Path to a JSON object mapping factId to value.
        #[arg(short, long)]
        facts: String,

        /// Output format: "text" or "json".
        #[arg(short = 'o', long, default_value = "text")]
        format: String,

        /// Allow facts referenced by a rule but absent from the facts
        /// file to resolve as `null` instead of erroring.
        #[arg(long)]
        allow_undefined_facts: bool,
    },

    /// Classify rules against a partial facts file: fully/partially
    /// satisfied, independent, or unsatisfied.
    Validate {
        /// Path to a JSON array of rules.
        #[arg(short, long)]
        rules: String,

        /// Path to a JSON object mapping factId to value.
        #[arg(short, long)]
        facts: String,

        /// Narrow independence to rules that reference this fact id.
        #[arg(long)]
        focused_fact: Option<String>,

        /// Output format: "text" or "json".
        #[arg(short = 'o', long, default_value = "text")]
        format: String,
    },

    /// Parse a rules file and report whether every rule round-trips.
    Check {
        /// Path to a JSON array of rules.
        rules: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        ruleforge_core::monitoring::init_tracing_with_config(
            ruleforge_core::monitoring::TracingConfig::verbose(),
        );
    }

    match cli.command {
        Commands::Eval { rules, facts, format, allow_undefined_facts } => {
            eval_command(rules, facts, format, allow_undefined_facts).await
        }
        Commands::Validate { rules, facts, focused_fact, format } => {
            validate_command(rules, facts, focused_fact, format).await
        }
        Commands::Check { rules } => check_command(rules).await,
    }
}

fn load_rules(path: &str) -> Result<Vec<Rule>> {
    let contents = fs::read_to_string(path).with_context(|| format!("failed to read rules file: {path}"))?;
    let rules: Vec<Rule> =
        serde_json::from_str(&contents).with_context(|| format!("failed to parse rules file: {path}"))?;
    Ok(rules)
}

fn load_facts(path: &str) -> Result<BTreeMap<String, Value>> {
    let contents = fs::read_to_string(path).with_context(|| format!("failed to read facts file: {path}"))?;
    let facts: BTreeMap<String, Value> =
        serde_json::from_str(&contents).with_context(|| format!("failed to parse facts file: {path}"))?;
    Ok(facts)
}

async fn eval_command(rules_path: String, facts_path: String, format: String, allow_undefined_facts: bool) -> Result<()> {
    let rules = load_rules(&rules_path)?;
    let facts = load_facts(&facts_path)?;

    let mut options = EngineOptions::default();
    options.allow_undefined_facts = allow_undefined_facts;
    let engine = RuleEngine::new(options);
    for rule in rules {
        engine.add_rule(rule);
    }

    let runtime_facts: Vec<Fact> = facts
        .into_iter()
        .map(|(id, value)| Fact::constant(id, value))
        .collect();

    let start = Instant::now();
    let outcome = engine.run(runtime_facts, RunOptions::default()).await?;
    let elapsed = start.elapsed();

    if format == "json" {
        let payload = serde_json::json!({
            "results": outcome.results.iter().map(rule_result_json).collect::<Vec<_>>(),
            "failureResults": outcome.failure_results.iter().map(rule_result_json).collect::<Vec<_>>(),
            "eventCount": outcome.events.len(),
            "failureEventCount": outcome.failure_events.len(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{} Evaluated {} rule(s) in {:.3}ms", "→".blue(), outcome.results.len() + outcome.failure_results.len(), elapsed.as_secs_f64() * 1000.0);
        for result in &outcome.results {
            println!("  {} {} (score {:.3}) -> {}", "PASS".green().bold(), result.name, result.score, result.event.event_type);
        }
        for result in &outcome.failure_results {
            println!("  {} {} (score {:.3})", "FAIL".red().bold(), result.name, result.score);
        }
    }

    Ok(())
}

fn rule_result_json(result: &ruleforge_core::RuleResult) -> serde_json::Value {
    serde_json::json!({
        "name": result.name,
        "priority": result.priority,
        "score": result.score,
        "result": result.result,
        "event": result.event,
    })
}

async fn validate_command(rules_path: String, facts_path: String, focused_fact: Option<String>, format: String) -> Result<()> {
    let rules = load_rules(&rules_path)?;
    let facts = load_facts(&facts_path)?;

    let engine = ValidationEngine::new(EngineOptions::default());
    for rule in rules {
        engine.add_rule(rule);
    }

    let classification = engine.find_satisfied_rules(facts, focused_fact.as_deref()).await;

    if format == "json" {
        let payload = serde_json::json!({
            "fullySatisfied": classification.fully_satisfied_rules.iter().map(classification_json).collect::<Vec<_>>(),
            "partiallySatisfied": classification.partially_satisfied_rules.iter().map(classification_json).collect::<Vec<_>>(),
            "independent": classification.independent_rules.iter().map(classification_json).collect::<Vec<_>>(),
            "unsatisfied": classification.unsatisfied_rules.iter().map(classification_json).collect::<Vec<_>>(),
            "summary": {
                "totalRules": classification.summary.total_rules,
                "fullySatisfied": classification.summary.fully_satisfied,
                "partiallySatisfied": classification.summary.partially_satisfied,
                "independent": classification.summary.independent,
                "totalSatisfied": classification.summary.total_satisfied,
                "unsatisfied": classification.summary.unsatisfied,
                "satisfactionRate": classification.summary.satisfaction_rate,
            },
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{} {} rule(s) classified:", "→".blue(), classification.summary.total_rules);
        print_bucket("fully satisfied", &classification.fully_satisfied_rules);
        print_bucket("partially satisfied", &classification.partially_satisfied_rules);
        print_bucket("independent", &classification.independent_rules);
        print_bucket("unsatisfied", &classification.unsatisfied_rules);
        println!(
            "{} satisfaction rate: {:.1}%",
            "▸".blue(),
            classification.summary.satisfaction_rate * 100.0
        );
    }

    Ok(())
}

fn print_bucket(label: &str, rules: &[ruleforge_core::RuleClassification]) {
    if rules.is_empty() {
        return;
    }
    println!("  {}:", label.bold());
    for rule in rules {
        println!("    {} ({}) score={:.3}", rule.name, rule.reason, rule.score);
    }
}

fn classification_json(rule: &ruleforge_core::RuleClassification) -> serde_json::Value {
    serde_json::json!({
        "name": rule.name,
        "priority": rule.priority,
        "score": rule.score,
        "reason": rule.reason,
        "missingFacts": rule.missing_facts,
    })
}

async fn check_command(rules_path: String) -> Result<()> {
    let contents = fs::read_to_string(&rules_path).with_context(|| format!("failed to read rules file: {rules_path}"))?;
    let rules: Vec<Rule> = match serde_json::from_str(&contents) {
        Ok(rules) => rules,
        Err(e) => {
            println!("{} rules file failed to parse: {e}", "✗".red());
            std::process::exit(1);
        }
    };

    let mut failures = 0;
    for rule in &rules {
        let round_tripped = serde_json::to_string(rule).and_then(|json| serde_json::from_str::<Rule>(&json));
        match round_tripped {
            Ok(_) => println!("  {} {}", "✓".green(), rule.name),
            Err(e) => {
                println!("  {} {}: {e}", "✗".red(), rule.name);
                failures += 1;
            }
        }
    }

    if failures == 0 {
        println!("{} {} rule(s) parsed and round-trip cleanly", "✓".green().bold(), rules.len());
        Ok(())
    } else {
        println!("{} {failures} rule(s) failed to round-trip", "✗".red().bold());
        std::process::exit(1);
    }
}
