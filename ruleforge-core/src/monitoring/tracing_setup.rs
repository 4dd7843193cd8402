//! Tracing and logging setup for RuleForge.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Initialize tracing with default configuration
pub fn init_tracing() {
    init_tracing_with_config(TracingConfig::default());
}

/// Initialize tracing with custom configuration
pub fn init_tracing_with_config(config: TracingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_level));

    let fmt_layer = fmt::layer()
        .with_span_events(config.span_events.clone())
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_thread_names(config.show_thread_names)
        .with_file(config.show_file)
        .with_line_number(config.show_line_number);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.json_output {
        let json_layer = fmt::layer()
            .json()
            .with_span_events(config.span_events)
            .with_target(true)
            .with_thread_ids(true);

        subscriber.with(json_layer).init();
    } else {
        subscriber.init();
    }
}

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default log level if RUST_LOG is not set
    pub default_level: String,
    /// Show span events (enter, exit, close)
    pub span_events: FmtSpan,
    /// Show target module in logs
    pub show_target: bool,
    /// Show thread IDs
    pub show_thread_ids: bool,
    /// Show thread names
    pub show_thread_names: bool,
    /// Show source file
    pub show_file: bool,
    /// Show line numbers
    pub show_line_number: bool,
    /// Output logs as JSON
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: "ruleforge=debug,info".to_string(),
            span_events: FmtSpan::CLOSE,
            show_target: true,
            show_thread_ids: false,
            show_thread_names: false,
            show_file: false,
            show_line_number: false,
            json_output: false,
        }
    }
}

impl TracingConfig {
    /// Create a production configuration
    pub fn production() -> Self {
        Self {
            default_level: "ruleforge=info,warn".to_string(),
            span_events: FmtSpan::NONE,
            show_target: true,
            show_thread_ids: false,
            show_thread_names: false,
            show_file: false,
            show_line_number: false,
            json_output: true, // JSON for structured logging
        }
    }

    /// Create a development configuration
    pub fn development() -> Self {
        Self {
            default_level: "ruleforge=debug,info".to_string(),
            span_events: FmtSpan::CLOSE,
            show_target: true,
            show_thread_ids: false,
            show_thread_names: false,
            show_file: true,
            show_line_number: true,
            json_output: false,
        }
    }

    /// Create a verbose configuration for debugging
    pub fn verbose() -> Self {
        Self {
            default_level: "ruleforge=trace,debug".to_string(),
            span_events: FmtSpan::ENTER | FmtSpan::EXIT | FmtSpan::CLOSE,
            show_target: true,
            show_thread_ids: true,
            show_thread_names: true,
            show_file: true,
            show_line_number: true,
            json_output: false,
        }
    }
}

/// Log a settled rule's outcome at the `ruleforge::rule` target.
#[macro_export]
macro_rules! trace_rule_evaluation {
    ($name:expr, $passed:expr, $score:expr, $duration:expr) => {
        tracing::debug!(
            target: "ruleforge::rule",
            rule = $name,
            passed = $passed,
            score = $score,
            duration_ms = $duration.as_millis() as u64,
            "rule evaluation settled"
        );
    };
}

/// Log a classification outcome at the `ruleforge::validation` target.
#[macro_export]
macro_rules! trace_classification {
    ($rule_count:expr, $satisfaction_type:expr, $duration:expr) => {
        tracing::debug!(
            target: "ruleforge::validation",
            rule_count = $rule_count,
            satisfaction_type = ?$satisfaction_type,
            duration_ms = $duration.as_millis() as u64,
            "classification run completed"
        );
    };
}

/// Log an almanac cache hit or miss at the `ruleforge::cache` target.
#[macro_export]
macro_rules! trace_cache_access {
    ($fact_id:expr, $hit:expr) => {
        tracing::trace!(
            target: "ruleforge::cache",
            fact = $fact_id,
            hit = $hit,
            "almanac cache access"
        );
    };
}

/// Log an error with additional context at the `ruleforge::error` target.
#[macro_export]
macro_rules! trace_error {
    ($error:expr, $context:expr) => {
        tracing::error!(
            target: "ruleforge::error",
            error = %$error,
            context = $context,
            "error occurred"
        );
    };
}

/// Performance span for instrumenting functions
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {
        tracing::span!(tracing::Level::DEBUG, $name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::span!(tracing::Level::DEBUG, $name, $($field)*)
    };
}
