//! Error taxonomy for RuleForge, per spec §7.

use thiserror::Error;

/// Main error type for RuleForge operations.
#[derive(Error, Debug)]
pub enum RuleForgeError {
    /// A condition node violates the shape invariants in spec §3: no
    /// discriminator key, a leaf missing `fact`/`operator`/`value`, or
    /// `not` given something other than a single child condition.
    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// A rule violates its construction invariants: non-positive
    /// priority, an event with no `type`, or a falsy name.
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// `OperatorRegistry::get` could not resolve the base operator
    /// named by the suffix of a (possibly decorator-chained) name.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// `OperatorRegistry::get` could not resolve one of the decorator
    /// prefixes in a chained operator name.
    #[error("unknown decorator: {0}")]
    UnknownDecorator(String),

    /// A leaf referenced a fact id the almanac has no entry for, and
    /// `allow_undefined_facts` was not set.
    #[error("undefined fact: {0}")]
    UndefinedFact(String),

    /// A `condition` reference named a condition the engine has no
    /// registration for, and `allow_undefined_conditions` was not set.
    #[error("unknown condition: {0}")]
    UnknownCondition(String),

    /// A rule-JSON document failed to parse or round-trip.
    #[error("parse error: {0}")]
    ParseError(String),

    /// A dynamic fact's computation returned an error.
    #[error("fact computation failed: {0}")]
    FactComputation(String),

    /// A listener or handler registered on the engine returned an
    /// error; it propagates and rejects the run.
    #[error("listener error: {0}")]
    ListenerError(String),

    /// I/O failure loading rules or facts from disk.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for RuleForge operations.
pub type Result<T> = std::result::Result<T, RuleForgeError>;
