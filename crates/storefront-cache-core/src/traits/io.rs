//! Transport and local storage traits

use async_trait::async_trait;
use serde_json::Value;

use crate::{CacheError, Request};

/// Outbound channel to the remote API
///
/// Implementations perform the HTTP call and return the decoded JSON body
/// of a 2xx response. Envelope unwrapping and typed decoding happen in the
/// cache, not here.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Execute one request
    ///
    /// Errors must use the cache taxonomy: `Network` for transport
    /// failures, `Timeout`, `Server` for non-2xx, `Decode` for bodies that
    /// are not JSON.
    async fn execute(&self, request: &Request) -> Result<Value, CacheError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn execute(&self, request: &Request) -> Result<Value, CacheError> {
        (**self).execute(request).await
    }
}

/// Client-side persistent key/value storage
///
/// Holds small JSON documents such as the locally-held cart.
#[async_trait]
pub trait LocalStore: Send + Sync + 'static {
    /// Read a value
    ///
    /// Returns `None` if the key was never written or was removed.
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: Value) -> Result<(), CacheError>;

    /// Remove a key
    ///
    /// Returns `true` if the key existed.
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Check if a key exists
    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }
}
