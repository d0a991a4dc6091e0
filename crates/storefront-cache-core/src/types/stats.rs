//! Cache statistics

/// Statistics for cache operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Queries answered from a fresh entry
    pub hits: u64,
    /// Queries that had to start a request
    pub misses: u64,
    /// Queries that joined a request already in flight
    pub coalesced: u64,
    /// Network requests issued for queries
    pub requests: u64,
    /// Network requests issued for mutations
    pub mutations: u64,
    /// Responses dropped because a newer request was initiated
    pub discarded: u64,
    /// Entries marked stale by tag invalidation
    pub invalidated: u64,
    /// Entries removed after their grace period
    pub evictions: u64,
    /// Current number of entries
    pub entries: usize,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0), counting joins as hits
    pub fn hit_ratio(&self) -> f64 {
        let total = self.total_queries();
        if total == 0 {
            0.0
        } else {
            (self.hits + self.coalesced) as f64 / total as f64
        }
    }

    /// Total query calls (hits + joins + misses)
    pub fn total_queries(&self) -> u64 {
        self.hits + self.coalesced + self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stats() {
        let stats = CacheStats::default();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.hit_ratio(), 0.0);
    }

    #[test]
    fn test_hit_ratio_counts_joins() {
        let stats = CacheStats {
            hits: 6,
            coalesced: 2,
            misses: 2,
            ..Default::default()
        };
        assert_eq!(stats.total_queries(), 10);
        assert!((stats.hit_ratio() - 0.8).abs() < f64::EPSILON);
    }
}
