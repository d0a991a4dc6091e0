use crate::{CacheMetrics, CacheOperation, EvictionReason};
use std::time::Duration;
use tracing::{debug, trace};

/// Metrics adapter that logs events via `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingMetrics {
    /// Service name/prefix (optional)
    service_name: Option<String>,
}

impl TracingMetrics {
    /// Create new tracing metrics adapter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with service name prefix
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }
}

impl CacheMetrics for TracingMetrics {
    fn record_hit(&self, key: &str) {
        debug!(
            target: "storefront_cache",
            event = "hit",
            key = %key,
            service = ?self.service_name,
            "Query Hit"
        );
    }

    fn record_miss(&self, key: &str) {
        debug!(
            target: "storefront_cache",
            event = "miss",
            key = %key,
            service = ?self.service_name,
            "Query Miss"
        );
    }

    fn record_stale_hit(&self, key: &str) {
        debug!(
            target: "storefront_cache",
            event = "stale_hit",
            key = %key,
            service = ?self.service_name,
            "Query Stale Hit"
        );
    }

    fn record_coalesced(&self, key: &str) {
        debug!(
            target: "storefront_cache",
            event = "coalesced",
            key = %key,
            service = ?self.service_name,
            "Query Joined In-Flight Request"
        );
    }

    fn record_latency(&self, operation: CacheOperation, duration: Duration) {
        trace!(
            target: "storefront_cache",
            event = "latency",
            operation = operation.as_str(),
            duration_ms = duration.as_millis() as u64,
            service = ?self.service_name,
            "Cache Operation Latency"
        );
    }

    fn record_eviction(&self, reason: EvictionReason) {
        debug!(
            target: "storefront_cache",
            event = "eviction",
            reason = reason.as_str(),
            service = ?self.service_name,
            "Cache Eviction"
        );
    }

    fn record_size(&self, entries: usize) {
        trace!(
            target: "storefront_cache",
            event = "size",
            entries = entries,
            service = ?self.service_name,
            "Cache Size Update"
        );
    }
}
