//! Rules: a weighted condition tree plus the event it fires. See spec §3.

use crate::condition::{AnnotatedCondition, Condition};
use crate::error::{Result, RuleForgeError};
use crate::reference::ValueOrRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A rule's outcome: the event type fired, plus its params (literals or
/// fact references, per spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub params: BTreeMap<String, ValueOrRef>,
}

impl Event {
    /// Build an event with no params.
    pub fn new(event_type: impl Into<String>) -> Self {
        Event {
            event_type: event_type.into(),
            params: BTreeMap::new(),
        }
    }

    /// Attach params (literals or fact references).
    pub fn with_params(mut self, params: BTreeMap<String, ValueOrRef>) -> Self {
        self.params = params;
        self
    }
}

/// Which of the almanac's two ordered event logs an emission belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Success,
    Failure,
}

/// One rule's settled evaluation: score, verdict, the fired event, and a
/// deep-copied, per-node-annotated condition tree (spec §3 RuleResult).
#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    pub name: String,
    pub priority: u32,
    pub event: Event,
    pub result: bool,
    pub score: f64,
    pub conditions: AnnotatedCondition,
}

/// The future a rule-level handler returns.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// A rule-level `onSuccess`/`onFailure` callback. Sugar for an
/// engine-wide subscriber filtered to this rule's name (spec §9 design
/// note) — the engine wires it in when the rule is added, so it is not
/// part of the rule's serializable JSON form.
pub type RuleHandler =
    Arc<dyn Fn(Event, Arc<crate::almanac::Almanac>) -> HandlerFuture + Send + Sync>;

static RULE_COUNTER: AtomicU64 = AtomicU64::new(1);

fn generated_name() -> String {
    format!("rule-{}", RULE_COUNTER.fetch_add(1, Ordering::Relaxed))
}

fn default_priority() -> u32 {
    1
}

/// A weighted condition tree plus the event it fires when its score
/// reaches 1. See spec §3 and §6 for the JSON form.
#[derive(Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default = "generated_name")]
    pub name: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
    pub conditions: Condition,
    pub event: Event,
    #[serde(skip)]
    pub on_success: Option<RuleHandler>,
    #[serde(skip)]
    pub on_failure: Option<RuleHandler>,
}

impl Rule {
    /// Build a rule with a generated name and default priority,
    /// validating the invariants from spec §7.
    pub fn new(conditions: Condition, event: Event) -> Result<Self> {
        let rule = Rule {
            name: generated_name(),
            priority: default_priority(),
            conditions,
            event,
            on_success: None,
            on_failure: None,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Parse and validate a rule from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let rule: Rule = serde_json::from_str(json)?;
        rule.validate()?;
        Ok(rule)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(RuleForgeError::InvalidRule("rule name must not be empty".to_string()));
        }
        self.name = name;
        Ok(self)
    }

    pub fn with_priority(mut self, priority: u32) -> Result<Self> {
        if priority == 0 {
            return Err(RuleForgeError::InvalidRule("priority must be >= 1".to_string()));
        }
        self.priority = priority;
        Ok(self)
    }

    /// Register a handler invoked after this rule settles with a
    /// passing score. Filtered to this rule by the engine, not a
    /// global success subscriber.
    pub fn with_on_success(mut self, handler: RuleHandler) -> Self {
        self.on_success = Some(handler);
        self
    }

    /// Register a handler invoked after this rule settles with a
    /// failing score.
    pub fn with_on_failure(mut self, handler: RuleHandler) -> Self {
        self.on_failure = Some(handler);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(RuleForgeError::InvalidRule("rule name must not be empty".to_string()));
        }
        if self.priority == 0 {
            return Err(RuleForgeError::InvalidRule("priority must be >= 1".to_string()));
        }
        if self.event.event_type.is_empty() {
            return Err(RuleForgeError::InvalidRule("event type must not be empty".to_string()));
        }
        self.conditions.validate().map_err(|e| match e {
            RuleForgeError::InvalidCondition(msg) => RuleForgeError::InvalidRule(msg),
            other => other,
        })
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("event", &self.event)
            .field("conditions", &self.conditions)
            .field("has_on_success", &self.on_success.is_some())
            .field("has_on_failure", &self.on_failure.is_some())
            .finish()
    }
}
