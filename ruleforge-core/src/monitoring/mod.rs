//! Ambient observability for RuleForge.
//!
//! The engine's logging story is ordinary `tracing` instrumentation
//! (see [`tracing_setup`]), not a bespoke metrics/exporter stack — the
//! teacher crate's Prometheus/OpenTelemetry exporter backed an HTTP
//! authorization-server surface this engine has no equivalent of
//! (network transports are an explicit non-goal). See `DESIGN.md` for
//! the full list of dropped teacher dependencies.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, init_tracing_with_config, TracingConfig};
