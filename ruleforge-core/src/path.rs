//! Default path projector.
//!
//! Spec §1 and §4.2 are explicit that the exact JSONPath dialect is out
//! of scope for the core — "any well-defined path-resolver callback
//! satisfies the core." This module is one concrete, well-defined
//! resolver: a dot/bracket dialect (`a.b[0].c`, with an optional leading
//! `$.`) good enough to project out of nested fact values. Callers may
//! supply any other `PathResolver` instead.

use crate::value::Value;

/// A pure projector from `(value, path) -> Option<value>`.
///
/// Almanac holds one of these; it is never mutated and never touches
/// the fact store, so it is safe to share across concurrently running
/// rules within a priority bucket.
pub type PathResolver = std::sync::Arc<dyn Fn(&Value, &str) -> Option<Value> + Send + Sync>;

/// Build the default resolver.
pub fn default_resolver() -> PathResolver {
    std::sync::Arc::new(resolve)
}

/// Resolve `path` against `value` using the built-in dot/bracket dialect.
///
/// An empty path returns `value` unchanged. Non-object, non-array values
/// pass through unprojected per spec §4.2 step 4, except when the path
/// itself is empty.
pub fn resolve(value: &Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() {
        return Some(value.clone());
    }

    let mut current = value.clone();
    for segment in split_segments(path) {
        current = match segment {
            Segment::Key(key) => match &current {
                Value::Object(map) => map.get(&key).cloned()?,
                _ => return None,
            },
            Segment::Index(idx) => match &current {
                Value::Array(items) => items.get(idx).cloned()?,
                _ => return None,
            },
        };
    }
    Some(current)
}

enum Segment {
    Key(String),
    Index(usize),
}

/// Split `a.b[0].c` into `[Key(a), Key(b), Index(0), Key(c)]`.
fn split_segments(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for dotted in path.split('.') {
        let mut rest = dotted;
        loop {
            if let Some(bracket_start) = rest.find('[') {
                if bracket_start > 0 {
                    segments.push(Segment::Key(rest[..bracket_start].to_string()));
                }
                if let Some(bracket_end) = rest[bracket_start..].find(']') {
                    let idx_str = &rest[bracket_start + 1..bracket_start + bracket_end];
                    if let Ok(idx) = idx_str.parse::<usize>() {
                        segments.push(Segment::Index(idx));
                    }
                    rest = &rest[bracket_start + bracket_end + 1..];
                    continue;
                }
            }
            if !rest.is_empty() {
                segments.push(Segment::Key(rest.to_string()));
            }
            break;
        }
    }
    segments
}
