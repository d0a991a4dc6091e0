//! Entry table shared by the client, its background fetches and subscriptions

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use futures::future::BoxFuture;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use storefront_cache_core::{
    CacheError, CacheKey, CacheMetrics, CacheOperation, CacheStats, EvictionReason, QueryState,
    QueryStatus, Result, Tag,
};

use super::tags::TagIndex;

/// Type-erased decoded response
pub(crate) type Payload = Arc<dyn Any + Send + Sync>;

/// Result of one network fetch with the tags it provides
pub(crate) struct FetchOutcome {
    pub(crate) result: Result<Payload>,
    pub(crate) tags: Vec<Tag>,
}

/// Re-runnable fetch bound to one entry's arguments
pub(crate) type FetchFn = Arc<dyn Fn() -> BoxFuture<'static, FetchOutcome> + Send + Sync>;

/// Identity of one subscribing consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl ConsumerId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ConsumerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl From<u64> for ConsumerId {
    fn from(id: u64) -> Self {
        ConsumerId(id)
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Untyped entry state, published on every transition
///
/// Requests are numbered per entry. `stale_through` records that results
/// of requests numbered at or below it predate an invalidation.
#[derive(Clone)]
pub(crate) struct EntrySnapshot {
    pub(crate) status: QueryStatus,
    pub(crate) data: Option<Payload>,
    pub(crate) error: Option<CacheError>,
    pub(crate) latest_seq: u64,
    pub(crate) settled_seq: u64,
    pub(crate) stale_through: u64,
    pub(crate) version: u64,
    pub(crate) updated_at: Option<SystemTime>,
}

impl EntrySnapshot {
    fn new() -> Self {
        Self {
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            latest_seq: 0,
            settled_seq: 0,
            stale_through: 0,
            version: 0,
            updated_at: None,
        }
    }

    pub(crate) fn is_fetching(&self) -> bool {
        self.latest_seq > self.settled_seq
    }

    pub(crate) fn is_stale(&self) -> bool {
        self.settled_seq > 0 && self.settled_seq <= self.stale_through
    }

    /// The newest request, settled or not, postdates every invalidation
    fn has_fresh_request(&self) -> bool {
        self.latest_seq > self.stale_through
    }

    /// Typed view for consumers of `T`
    pub(crate) fn typed<T: Send + Sync + 'static>(&self) -> QueryState<T> {
        QueryState {
            status: self.status,
            data: self
                .data
                .clone()
                .and_then(|payload| payload.downcast::<T>().ok()),
            error: self.error.clone(),
            is_fetching: self.is_fetching(),
            is_stale: self.is_stale(),
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

impl fmt::Debug for EntrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntrySnapshot")
            .field("status", &self.status)
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .field("latest_seq", &self.latest_seq)
            .field("settled_seq", &self.settled_seq)
            .field("stale_through", &self.stale_through)
            .field("version", &self.version)
            .finish()
    }
}

/// One cache entry with its bookkeeping
struct Slot {
    fetch: FetchFn,
    state: EntrySnapshot,
    provided: Vec<Tag>,
    subscribers: HashMap<ConsumerId, usize>,
    eviction: Option<AbortHandle>,
    eviction_gen: u64,
    tx: watch::Sender<EntrySnapshot>,
}

impl Slot {
    fn new(fetch: FetchFn) -> Self {
        let state = EntrySnapshot::new();
        let (tx, _rx) = watch::channel(state.clone());
        Self {
            fetch,
            state,
            provided: Vec::new(),
            subscribers: HashMap::new(),
            eviction: None,
            eviction_gen: 0,
            tx,
        }
    }

    fn publish(&mut self) {
        self.state.version += 1;
        self.tx.send_replace(self.state.clone());
    }

    /// Number a new request and mark the entry as fetching
    fn begin(&mut self) -> (u64, FetchFn) {
        self.state.latest_seq += 1;
        if self.state.status == QueryStatus::Uninitialized {
            self.state.status = QueryStatus::Pending;
        }
        self.publish();
        (self.state.latest_seq, Arc::clone(&self.fetch))
    }

    fn cancel_eviction(&mut self) {
        if let Some(timer) = self.eviction.take() {
            timer.abort();
        }
        self.eviction_gen += 1;
    }

    fn is_idle(&self) -> bool {
        self.subscribers.is_empty() && !self.state.is_fetching()
    }

    fn provides_any(&self, invalidated: &[Tag]) -> bool {
        invalidated
            .iter()
            .any(|tag| self.provided.iter().any(|provided| tag.matches(provided)))
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    requests: AtomicU64,
    mutations: AtomicU64,
    discarded: AtomicU64,
    invalidated: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// What a `request` call resolved to
pub(crate) enum Resolution {
    /// Settled and fresh, nothing to wait for
    Cached,
    /// Wait until the entry settles this request
    Await(u64),
}

/// All cache entries, keyed by [`CacheKey`]
///
/// Every entry mutation happens under that entry's map lock. The tag index
/// is only touched while an entry lock is held, never the other way round.
pub(crate) struct Store {
    slots: DashMap<CacheKey, Slot>,
    tags: TagIndex,
    runtime: Handle,
    keep_unused_for: Duration,
    metrics: Arc<dyn CacheMetrics>,
    counters: Counters,
}

impl Store {
    pub(crate) fn new(
        runtime: Handle,
        keep_unused_for: Duration,
        metrics: Arc<dyn CacheMetrics>,
    ) -> Self {
        Self {
            slots: DashMap::new(),
            tags: TagIndex::new(),
            runtime,
            keep_unused_for,
            metrics,
            counters: Counters::default(),
        }
    }

    /// Resolve a one-shot read of `key`
    ///
    /// Joins a fresh in-flight request, answers from a fresh settled entry,
    /// or starts a new request. `force` always starts a new one.
    pub(crate) fn request<F>(
        self: &Arc<Self>,
        key: &CacheKey,
        make_fetch: F,
        force: bool,
    ) -> (watch::Receiver<EntrySnapshot>, Resolution)
    where
        F: FnOnce() -> FetchFn,
    {
        let mut slot = self.slot_mut(key, make_fetch);
        let rx = slot.tx.subscribe();
        let label = key.to_string();

        if !force && slot.state.has_fresh_request() {
            if slot.state.is_fetching() {
                Counters::bump(&self.counters.coalesced);
                self.metrics.record_coalesced(&label);
                trace!(target: "storefront_cache", key = %key, seq = slot.state.latest_seq, "joined in-flight request");
                return (rx, Resolution::Await(slot.state.latest_seq));
            }
            Counters::bump(&self.counters.hits);
            self.metrics.record_hit(&label);
            return (rx, Resolution::Cached);
        }

        if slot.state.data.is_some() {
            self.metrics.record_stale_hit(&label);
        }
        Counters::bump(&self.counters.misses);
        self.metrics.record_miss(&label);
        let (seq, fetch) = slot.begin();
        self.spawn_fetch(key.clone(), seq, fetch);
        let created = seq == 1;
        drop(slot);
        if created {
            self.metrics.record_size(self.slots.len());
        }
        (rx, Resolution::Await(seq))
    }

    /// Register interest of `consumer` in `key`
    ///
    /// Cancels a pending eviction. Fetches if the entry was never requested,
    /// or if this is the first subscriber and the entry is stale.
    pub(crate) fn subscribe<F>(
        self: &Arc<Self>,
        key: &CacheKey,
        consumer: ConsumerId,
        make_fetch: F,
    ) -> watch::Receiver<EntrySnapshot>
    where
        F: FnOnce() -> FetchFn,
    {
        let mut slot = self.slot_mut(key, make_fetch);
        slot.cancel_eviction();
        let first = slot.subscribers.is_empty();
        *slot.subscribers.entry(consumer).or_insert(0) += 1;
        let rx = slot.tx.subscribe();

        let never_requested = slot.state.latest_seq == 0;
        if never_requested || (first && !slot.state.has_fresh_request()) {
            Counters::bump(&self.counters.misses);
            self.metrics.record_miss(&key.to_string());
            let (seq, fetch) = slot.begin();
            self.spawn_fetch(key.clone(), seq, fetch);
        } else if !slot.state.is_fetching() {
            Counters::bump(&self.counters.hits);
            self.metrics.record_hit(&key.to_string());
        }
        debug!(target: "storefront_cache", key = %key, consumer = %consumer, subscribers = slot.subscribers.len(), "subscribed");
        drop(slot);
        if never_requested {
            self.metrics.record_size(self.slots.len());
        }
        rx
    }

    /// Drop one subscription of `consumer` to `key`
    pub(crate) fn unsubscribe(self: &Arc<Self>, key: &CacheKey, consumer: ConsumerId) {
        let Some(mut slot) = self.slots.get_mut(key) else {
            return;
        };
        if let Some(count) = slot.subscribers.get_mut(&consumer) {
            *count -= 1;
            if *count == 0 {
                slot.subscribers.remove(&consumer);
            }
        }
        debug!(target: "storefront_cache", key = %key, consumer = %consumer, subscribers = slot.subscribers.len(), "unsubscribed");
        self.arm_eviction(key, &mut slot);
    }

    /// Mark every entry providing a matching tag as stale
    ///
    /// Subscribed entries refetch in the background. Returns the number of
    /// entries hit.
    pub(crate) fn invalidate(self: &Arc<Self>, invalidated: &[Tag]) -> usize {
        let started = Instant::now();
        let mut count = 0;
        for key in self.tags.matching(invalidated) {
            let Some(mut slot) = self.slots.get_mut(&key) else {
                continue;
            };
            if !slot.provides_any(invalidated) {
                continue;
            }
            count += 1;

            let through = slot.state.stale_through.max(slot.state.latest_seq);
            let changed = through != slot.state.stale_through;
            slot.state.stale_through = through;

            if !slot.subscribers.is_empty() {
                debug!(target: "storefront_cache", key = %key, "invalidated, refetching for subscribers");
                let (seq, fetch) = slot.begin();
                self.spawn_fetch(key.clone(), seq, fetch);
            } else if changed {
                debug!(target: "storefront_cache", key = %key, "invalidated");
                slot.publish();
            }
        }
        self.counters
            .invalidated
            .fetch_add(count as u64, Ordering::Relaxed);
        self.metrics
            .record_latency(CacheOperation::Invalidate, started.elapsed());
        count
    }

    /// Current untyped state of `key`
    pub(crate) fn peek(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        self.slots.get(key).map(|slot| slot.state.clone())
    }

    /// Tags currently provided by `key`
    pub(crate) fn provided(&self, key: &CacheKey) -> Vec<Tag> {
        self.slots
            .get(key)
            .map(|slot| slot.provided.clone())
            .unwrap_or_default()
    }

    /// Live subscription count of `key`
    pub(crate) fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.slots
            .get(key)
            .map(|slot| slot.subscribers.values().sum())
            .unwrap_or(0)
    }

    pub(crate) fn contains(&self, key: &CacheKey) -> bool {
        self.slots.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Drop every entry
    ///
    /// Pending requests still complete but their responses are ignored.
    pub(crate) fn clear(&self) -> usize {
        let keys: Vec<CacheKey> = self.slots.iter().map(|slot| slot.key().clone()).collect();
        let mut removed = 0;
        for key in keys {
            if let Entry::Occupied(mut occupied) = self.slots.entry(key) {
                occupied.get_mut().cancel_eviction();
                let provided = std::mem::take(&mut occupied.get_mut().provided);
                self.tags.unregister(occupied.key(), &provided);
                occupied.remove();
                self.metrics.record_eviction(EvictionReason::Removed);
                removed += 1;
            }
        }
        self.metrics.record_size(self.slots.len());
        debug!(target: "storefront_cache", removed, "cache cleared");
        removed
    }

    pub(crate) fn count_mutation(&self) {
        Counters::bump(&self.counters.mutations);
    }

    pub(crate) fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            requests: c.requests.load(Ordering::Relaxed),
            mutations: c.mutations.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
            invalidated: c.invalidated.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            entries: self.slots.len(),
        }
    }

    fn slot_mut<F>(&self, key: &CacheKey, make_fetch: F) -> RefMut<'_, CacheKey, Slot>
    where
        F: FnOnce() -> FetchFn,
    {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(occupied) => occupied.into_ref(),
            Entry::Vacant(vacant) => {
                trace!(target: "storefront_cache", key = %key, "entry created");
                vacant.insert(Slot::new(make_fetch()))
            }
        }
    }

    fn spawn_fetch(self: &Arc<Self>, key: CacheKey, seq: u64, fetch: FetchFn) {
        Counters::bump(&self.counters.requests);
        debug!(target: "storefront_cache", key = %key, seq, "fetch started");
        let store = Arc::clone(self);
        self.runtime.spawn(async move {
            let started = Instant::now();
            let outcome = fetch().await;
            store
                .metrics
                .record_latency(CacheOperation::Fetch, started.elapsed());
            store.settle(&key, seq, outcome);
        });
    }

    /// Apply the response of request `seq`
    ///
    /// Responses of requests superseded by a later one are discarded.
    fn settle(self: &Arc<Self>, key: &CacheKey, seq: u64, outcome: FetchOutcome) {
        let Some(mut slot) = self.slots.get_mut(key) else {
            trace!(target: "storefront_cache", key = %key, seq, "entry gone, response dropped");
            return;
        };
        if seq < slot.state.latest_seq {
            Counters::bump(&self.counters.discarded);
            debug!(target: "storefront_cache", key = %key, seq, latest = slot.state.latest_seq, "discarded superseded response");
            return;
        }

        match outcome.result {
            Ok(data) => {
                slot.state.status = QueryStatus::Fulfilled;
                slot.state.data = Some(data);
                slot.state.error = None;
            }
            Err(err) => {
                debug!(target: "storefront_cache", key = %key, seq, error = %err, "fetch failed");
                slot.state.status = QueryStatus::Rejected;
                slot.state.error = Some(err);
            }
        }
        slot.state.settled_seq = seq;
        slot.state.updated_at = Some(SystemTime::now());

        let mut tags = outcome.tags;
        tags.sort();
        tags.dedup();
        let old = std::mem::replace(&mut slot.provided, tags);
        self.tags.update(key, &old, &slot.provided);

        slot.publish();
        debug!(target: "storefront_cache", key = %key, seq, status = slot.state.status.as_str(), stale = slot.state.is_stale(), "settled");
        self.arm_eviction(key, &mut slot);
    }

    /// Start the grace timer if nothing holds the entry
    fn arm_eviction(self: &Arc<Self>, key: &CacheKey, slot: &mut Slot) {
        if !slot.is_idle() {
            return;
        }
        slot.cancel_eviction();
        let generation = slot.eviction_gen;
        let store = Arc::clone(self);
        let key = key.clone();
        let grace = self.keep_unused_for;
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            store.evict(&key, generation);
        });
        slot.eviction = Some(timer.abort_handle());
    }

    fn evict(&self, key: &CacheKey, generation: u64) {
        let Entry::Occupied(mut occupied) = self.slots.entry(key.clone()) else {
            return;
        };
        let slot = occupied.get_mut();
        if slot.eviction_gen != generation || !slot.is_idle() {
            return;
        }
        let provided = std::mem::take(&mut slot.provided);
        self.tags.unregister(key, &provided);
        occupied.remove();

        Counters::bump(&self.counters.evictions);
        self.metrics.record_eviction(EvictionReason::Unused);
        self.metrics.record_size(self.slots.len());
        debug!(target: "storefront_cache", key = %key, "evicted unused entry");
    }
}
