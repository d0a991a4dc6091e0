//! Canonical cache keys

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::{CacheError, Result};

/// Identifier of a cached query result
///
/// Derived from the endpoint name and the canonical JSON form of the
/// query arguments. Object keys are sorted recursively, so two argument
/// values that differ only in field order map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    endpoint: Arc<str>,
    args: Arc<str>,
}

impl CacheKey {
    /// Derive the key for `args` on `endpoint`
    pub fn new<A>(endpoint: &str, args: &A) -> Result<Self>
    where
        A: Serialize + ?Sized,
    {
        let value = serde_json::to_value(args)
            .map_err(|e| CacheError::InvalidInput(format!("unserializable query args: {e}")))?;
        Ok(Self::from_value(endpoint, value))
    }

    /// Derive the key from an already-serialized argument value
    pub fn from_value(endpoint: &str, value: Value) -> Self {
        let canonical = canonicalize(value);
        Self {
            endpoint: Arc::from(endpoint),
            args: Arc::from(canonical.to_string()),
        }
    }

    /// Endpoint name part
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Canonical JSON of the arguments
    pub fn args(&self) -> &str {
        &self.args
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.endpoint, self.args)
    }
}

/// Sort object keys recursively
///
/// Rebuilds every map in sorted order so the result is stable whether or
/// not `serde_json` preserves insertion order.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::with_capacity(entries.len());
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
