//! Metrics trait for cache observability

use std::time::Duration;

/// Cache operation for latency tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    /// Network fetch backing a query
    Fetch,
    /// Mutation round trip
    Mutate,
    /// Tag invalidation pass
    Invalidate,
    /// Cart reconciliation pass
    Reconcile,
}

impl CacheOperation {
    /// Get operation as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOperation::Fetch => "fetch",
            CacheOperation::Mutate => "mutate",
            CacheOperation::Invalidate => "invalidate",
            CacheOperation::Reconcile => "reconcile",
        }
    }
}

/// Reason for cache eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionReason {
    /// Grace period elapsed with no subscribers
    Unused,
    /// Explicitly removed
    Removed,
}

impl EvictionReason {
    /// Get reason as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Unused => "unused",
            EvictionReason::Removed => "removed",
        }
    }
}

/// Trait for cache metrics/observability
///
/// Implement this to integrate with your metrics system (Prometheus, StatsD, etc.)
pub trait CacheMetrics: Send + Sync + 'static {
    /// Record a query answered from a fresh entry
    fn record_hit(&self, key: &str);

    /// Record a query that started a request
    fn record_miss(&self, key: &str);

    /// Record stale data served while a refetch runs
    fn record_stale_hit(&self, key: &str);

    /// Record a query that joined an in-flight request
    fn record_coalesced(&self, key: &str);

    /// Record operation latency
    fn record_latency(&self, operation: CacheOperation, duration: Duration);

    /// Record an eviction
    fn record_eviction(&self, reason: EvictionReason);

    /// Record the number of live entries
    fn record_size(&self, entries: usize);
}

/// No-op metrics implementation (default)
///
/// Zero overhead when metrics are not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl CacheMetrics for NoopMetrics {
    #[inline]
    fn record_hit(&self, _key: &str) {}

    #[inline]
    fn record_miss(&self, _key: &str) {}

    #[inline]
    fn record_stale_hit(&self, _key: &str) {}

    #[inline]
    fn record_coalesced(&self, _key: &str) {}

    #[inline]
    fn record_latency(&self, _operation: CacheOperation, _duration: Duration) {}

    #[inline]
    fn record_eviction(&self, _reason: EvictionReason) {}

    #[inline]
    fn record_size(&self, _entries: usize) {}
}

/// Metrics adapter using the `metrics` crate
///
/// Integrates with Prometheus, StatsD, and other exporters via the `metrics` ecosystem.
///
/// # Example
/// ```ignore
/// use storefront_cache_core::MetricsCrateAdapter;
///
/// // Set up a metrics recorder (e.g., prometheus_exporter)
/// // metrics::set_global_recorder(recorder);
///
/// let metrics = MetricsCrateAdapter::new("storefront_cache");
/// // Emits: storefront_cache_hits_total, storefront_cache_misses_total, etc.
/// ```
#[cfg(feature = "metrics")]
#[derive(Debug, Clone)]
pub struct MetricsCrateAdapter {
    prefix: String,
}

#[cfg(feature = "metrics")]
impl MetricsCrateAdapter {
    /// Create a new adapter with the given metric name prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn metric_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }
}

#[cfg(feature = "metrics")]
impl CacheMetrics for MetricsCrateAdapter {
    fn record_hit(&self, key: &str) {
        metrics::counter!(self.metric_name("hits_total"), "endpoint" => endpoint_label(key))
            .increment(1);
    }

    fn record_miss(&self, key: &str) {
        metrics::counter!(self.metric_name("misses_total"), "endpoint" => endpoint_label(key))
            .increment(1);
    }

    fn record_stale_hit(&self, key: &str) {
        metrics::counter!(self.metric_name("stale_hits_total"), "endpoint" => endpoint_label(key))
            .increment(1);
    }

    fn record_coalesced(&self, key: &str) {
        metrics::counter!(self.metric_name("coalesced_total"), "endpoint" => endpoint_label(key))
            .increment(1);
    }

    fn record_latency(&self, operation: CacheOperation, duration: Duration) {
        metrics::histogram!(
            self.metric_name("operation_duration_seconds"),
            "operation" => operation.as_str()
        )
        .record(duration.as_secs_f64());
    }

    fn record_eviction(&self, reason: EvictionReason) {
        metrics::counter!(
            self.metric_name("evictions_total"),
            "reason" => reason.as_str()
        )
        .increment(1);
    }

    fn record_size(&self, entries: usize) {
        metrics::gauge!(self.metric_name("entries")).set(entries as f64);
    }
}

/// Endpoint part of a rendered cache key, `getAllBrands({..})` -> `getAllBrands`
#[cfg(feature = "metrics")]
fn endpoint_label(key: &str) -> String {
    key.split('(').next().unwrap_or(key).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_as_str() {
        assert_eq!(CacheOperation::Fetch.as_str(), "fetch");
        assert_eq!(CacheOperation::Mutate.as_str(), "mutate");
    }

    #[test]
    fn test_eviction_reason_as_str() {
        assert_eq!(EvictionReason::Unused.as_str(), "unused");
        assert_eq!(EvictionReason::Removed.as_str(), "removed");
    }

    #[test]
    fn test_noop_metrics() {
        let metrics = NoopMetrics;
        // Just verify these don't panic
        metrics.record_hit("getBrand(1)");
        metrics.record_miss("getBrand(1)");
        metrics.record_latency(CacheOperation::Fetch, Duration::from_millis(1));
    }
}
