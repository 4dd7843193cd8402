//! Engine-wide configuration flags, per spec §6.

use crate::path::{default_resolver, PathResolver};

/// Recognized engine configuration options.
#[derive(Clone)]
pub struct EngineOptions {
    /// Missing facts yield `Value::Null` (`undefined`) instead of
    /// raising `UndefinedFact`.
    pub allow_undefined_facts: bool,
    /// Missing named conditions score 0 instead of raising
    /// `UnknownCondition`.
    pub allow_undefined_conditions: bool,
    /// Resolve fact-reference objects inside event params against the
    /// almanac before emission.
    pub replace_facts_in_event_params: bool,
    /// Path projector used by `Almanac::fact_value`. Defaults to the
    /// built-in dot/bracket dialect (see `crate::path`).
    pub path_resolver: PathResolver,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            allow_undefined_facts: false,
            allow_undefined_conditions: false,
            replace_facts_in_event_params: false,
            path_resolver: default_resolver(),
        }
    }
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("allow_undefined_facts", &self.allow_undefined_facts)
            .field("allow_undefined_conditions", &self.allow_undefined_conditions)
            .field(
                "replace_facts_in_event_params",
                &self.replace_facts_in_event_params,
            )
            .finish()
    }
}
