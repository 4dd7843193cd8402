//! Facts: named inputs consulted by conditions, constant or computed.

use crate::error::Result;
use crate::value::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Parameters passed to a dynamic fact's computation, and the key
/// material for the almanac's memoization cache.
pub type FactParams = Arc<BTreeMap<String, Value>>;

/// The future a dynamic fact's computation returns. Boxed and `Send`
/// because it may be awaited from any task in a priority bucket.
pub type FactFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// A dynamic fact's computation: `(params, almanac) -> future<value>`.
///
/// Takes `Arc<Almanac>` rather than `&Almanac` so the closure can be
/// `'static` and handed to `tokio::spawn`.
pub type FactComputation =
    Arc<dyn Fn(FactParams, Arc<crate::almanac::Almanac>) -> FactFuture + Send + Sync>;

/// A named input value: identity plus either a constant or a
/// computation. See spec §3.
#[derive(Clone)]
pub struct Fact {
    /// The fact's identity, e.g. `"accountBalance"`.
    pub id: String,
    /// Evaluation priority hint; highest runs first when a condition
    /// child inherits its ordering from the referenced fact.
    pub priority: u32,
    /// Whether the almanac should memoize this fact's computed value
    /// per distinct `params`.
    pub cache: bool,
    source: FactSource,
}

#[derive(Clone)]
enum FactSource {
    Constant(Value),
    Dynamic(FactComputation),
}

impl Fact {
    /// A fact with a fixed value, independent of `params`.
    pub fn constant(id: impl Into<String>, value: Value) -> Self {
        Fact {
            id: id.into(),
            priority: 1,
            cache: true,
            source: FactSource::Constant(value),
        }
    }

    /// A fact computed on demand from `params` and the run's almanac.
    pub fn dynamic(id: impl Into<String>, computation: FactComputation) -> Self {
        Fact {
            id: id.into(),
            priority: 1,
            cache: true,
            source: FactSource::Dynamic(computation),
        }
    }

    /// Override the evaluation-order priority (default 1).
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Override memoization (default enabled).
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Whether this fact's value depends on `params`/the almanac at all.
    pub fn is_constant(&self) -> bool {
        matches!(self.source, FactSource::Constant(_))
    }

    /// Resolve this fact's value for the given params against `almanac`.
    pub fn evaluate(&self, params: FactParams, almanac: Arc<crate::almanac::Almanac>) -> FactFuture {
        match &self.source {
            FactSource::Constant(v) => {
                let v = v.clone();
                Box::pin(async move { Ok(v) })
            }
            FactSource::Dynamic(f) => f(params, almanac),
        }
    }
}

impl std::fmt::Debug for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fact")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("cache", &self.cache)
            .field("constant", &self.is_constant())
            .finish()
    }
}
