//! In-memory local store using DashMap

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

use storefront_cache_core::{CacheError, LocalStore, Result};

/// Configuration for the memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    /// Prefix applied to every key, e.g. the storefront origin
    pub namespace: Option<String>,
    /// Maximum number of keys (0 = unlimited)
    pub max_keys: usize,
}

impl MemoryConfig {
    /// Create config with a key namespace
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    /// Create config with a key limit
    pub fn with_max_keys(max_keys: usize) -> Self {
        Self {
            max_keys,
            ..Default::default()
        }
    }
}

/// Internal statistics tracking
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStoreStats {
    /// Reads that found a value
    pub hits: u64,
    /// Reads that found nothing
    pub misses: u64,
    /// Writes
    pub writes: u64,
    /// Removals of existing keys
    pub removes: u64,
}

/// In-memory local store
///
/// Stands in for browser local storage in tests and server-side rendering.
/// Cloning creates a new handle to the SAME underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<DashMap<String, Value>>,
    stats: Arc<RwLock<MemoryStoreStats>>,
    config: MemoryConfig,
}

impl MemoryStore {
    /// Create a new memory store
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            stats: Arc::new(RwLock::new(MemoryStoreStats::default())),
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(MemoryConfig::default())
    }

    fn full_key(&self, key: &str) -> String {
        match &self.config.namespace {
            Some(ns) => format!("{}:{}", ns, key),
            None => key.to_string(),
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> MemoryStoreStats {
        *self.stats.read()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let value = self.data.get(&self.full_key(key)).map(|v| v.value().clone());
        let mut stats = self.stats.write();
        if value.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let full_key = self.full_key(key);
        if self.config.max_keys > 0
            && self.data.len() >= self.config.max_keys
            && !self.data.contains_key(&full_key)
        {
            return Err(CacheError::Storage(format!(
                "memory store is full ({} keys)",
                self.config.max_keys
            )));
        }
        self.data.insert(full_key, value);
        self.stats.write().writes += 1;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let removed = self.data.remove(&self.full_key(key)).is_some();
        if removed {
            self.stats.write().removes += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_basic_get_set() {
        let store = MemoryStore::with_defaults();

        store.set("cart", json!([{"productId": "P1"}])).await.unwrap();

        let value = store.get("cart").await.unwrap();
        assert_eq!(value, Some(json!([{"productId": "P1"}])));
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryStore::with_defaults();
        store.set("cart", json!([])).await.unwrap();
        assert!(store.contains("cart").await.unwrap());

        assert!(store.remove("cart").await.unwrap());
        assert!(!store.contains("cart").await.unwrap());
        assert!(!store.remove("cart").await.unwrap());
    }

    #[tokio::test]
    async fn test_namespace_isolates_clones() {
        let shared = MemoryStore::new(MemoryConfig::with_namespace("shop-a"));
        let handle = shared.clone();

        shared.set("cart", json!(1)).await.unwrap();
        assert_eq!(handle.get("cart").await.unwrap(), Some(json!(1)));
        assert_eq!(shared.len(), 1);
    }

    #[tokio::test]
    async fn test_max_keys() {
        let store = MemoryStore::new(MemoryConfig::with_max_keys(1));
        store.set("a", json!(1)).await.unwrap();
        // Overwriting an existing key is always allowed
        store.set("a", json!(2)).await.unwrap();

        let err = store.set("b", json!(3)).await.unwrap_err();
        assert!(matches!(err, CacheError::Storage(_)));
    }

    #[tokio::test]
    async fn test_stats() {
        let store = MemoryStore::with_defaults();
        store.set("a", json!(1)).await.unwrap();
        store.get("a").await.unwrap();
        store.get("missing").await.unwrap();

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
    }
}
