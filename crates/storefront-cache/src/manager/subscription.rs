//! Consumer subscriptions to cache entries

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;

use storefront_cache_core::{CacheError, CacheKey, QueryState, Result};

use super::store::{ConsumerId, EntrySnapshot, Store};

/// A consumer's live interest in one cache entry
///
/// Holds the entry alive: it is never evicted while any subscription to it
/// exists. Dropping the subscription releases it and, if it was the last
/// one, starts the eviction grace period.
pub struct Subscription<T> {
    key: CacheKey,
    consumer: ConsumerId,
    rx: watch::Receiver<EntrySnapshot>,
    store: Arc<Store>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Subscription<T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn new(
        key: CacheKey,
        consumer: ConsumerId,
        rx: watch::Receiver<EntrySnapshot>,
        store: Arc<Store>,
    ) -> Self {
        Self {
            key,
            consumer,
            rx,
            store,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn consumer(&self) -> ConsumerId {
        self.consumer
    }

    /// Latest state of the entry
    pub fn current(&self) -> QueryState<T> {
        self.rx.borrow().typed()
    }

    /// Wait for the next transition and return the new state
    pub async fn changed(&mut self) -> Result<QueryState<T>> {
        self.rx.changed().await.map_err(|_| self.closed())?;
        Ok(self.rx.borrow_and_update().typed())
    }

    /// Wait until no request is in flight and something has settled
    pub async fn settled(&mut self) -> Result<QueryState<T>> {
        let state = self
            .rx
            .wait_for(|s| s.settled_seq > 0 && !s.is_fetching())
            .await
            .map_err(|_| CacheError::Internal(format!("cache entry {} was removed", self.key)))?
            .typed();
        Ok(state)
    }

    /// Release the subscription
    ///
    /// Same as dropping it.
    pub fn unsubscribe(self) {}

    fn closed(&self) -> CacheError {
        CacheError::Internal(format!("cache entry {} was removed", self.key))
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.store.unsubscribe(&self.key, self.consumer);
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("consumer", &self.consumer)
            .finish()
    }
}
