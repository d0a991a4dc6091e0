//! Client configuration

use std::time::Duration;

/// Configuration for [`QueryClient`](crate::QueryClient)
///
/// Supplied once when the client is built and immutable afterwards.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for every network request unless the endpoint overrides it
    pub request_timeout: Duration,
    /// Grace period an entry survives after its last subscriber leaves
    pub keep_unused_for: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            keep_unused_for: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    /// Create config with a specific request timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            request_timeout: timeout,
            ..Default::default()
        }
    }

    /// Set the eviction grace period
    pub fn keep_unused_for(mut self, grace: Duration) -> Self {
        self.keep_unused_for = grace;
        self
    }

    /// Set the default request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.keep_unused_for, Duration::from_secs(60));
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::with_timeout(Duration::from_secs(5))
            .keep_unused_for(Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.keep_unused_for, Duration::from_secs(2));
    }
}
