//! Observable query state

use std::sync::Arc;
use std::time::SystemTime;

use crate::CacheError;

/// Outcome of the latest settled request for an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    /// No request started yet
    Uninitialized,
    /// First request in flight, nothing settled
    Pending,
    /// Last settled request succeeded
    Fulfilled,
    /// Last settled request failed
    Rejected,
}

impl QueryStatus {
    /// Get status as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Uninitialized => "uninitialized",
            QueryStatus::Pending => "pending",
            QueryStatus::Fulfilled => "fulfilled",
            QueryStatus::Rejected => "rejected",
        }
    }
}

/// Typed view of a cache entry, as seen by a consumer
///
/// `data` is the last-known-good value and survives later failures and
/// refetches. `error` is set only while the latest settled request failed.
#[derive(Debug)]
pub struct QueryState<T> {
    /// Latest settled outcome
    pub status: QueryStatus,
    /// Last successful payload
    pub data: Option<Arc<T>>,
    /// Error of the latest settled request
    pub error: Option<CacheError>,
    /// A request is in flight
    pub is_fetching: bool,
    /// Entry was invalidated after its current result was requested
    pub is_stale: bool,
    /// Monotonic transition counter
    pub version: u64,
    /// When the latest result settled
    pub updated_at: Option<SystemTime>,
}

impl<T> QueryState<T> {
    /// State of an entry nobody has requested yet
    pub fn uninitialized() -> Self {
        Self {
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            is_fetching: false,
            is_stale: false,
            version: 0,
            updated_at: None,
        }
    }

    /// First load in flight with nothing to show
    pub fn is_loading(&self) -> bool {
        self.is_fetching && self.data.is_none()
    }

    /// Latest settled request succeeded
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Fulfilled
    }

    /// Latest settled request failed
    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Rejected
    }

    /// Borrow the last-known-good value
    pub fn value(&self) -> Option<&T> {
        self.data.as_deref()
    }

    /// Convert into a result: data if the latest request succeeded, else its error
    pub fn into_result(self) -> Result<Arc<T>, CacheError> {
        match (self.error, self.data) {
            (Some(err), _) => Err(err),
            (None, Some(data)) => Ok(data),
            (None, None) => Err(CacheError::InvalidState(format!(
                "query is {}",
                self.status.as_str()
            ))),
        }
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::uninitialized()
    }
}
