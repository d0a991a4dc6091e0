//! Query client: cached reads, mutations and invalidation

use futures::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use storefront_cache_core::{
    CacheError, CacheKey, CacheMetrics, CacheOperation, CacheStats, NoopMetrics, QueryState,
    Request, Result, Tag, Transport, unwrap_envelope,
};

use crate::config::ClientConfig;
use crate::registry::{EndpointKind, EndpointRegistry, MutationHandle, QueryHandle, RegistryId};

mod store;
mod subscription;
mod tags;

pub use store::ConsumerId;
pub use subscription::Subscription;

use store::{FetchFn, FetchOutcome, Payload, Resolution, Store};

/// How many times a read retries when its response was invalidated in flight
const MAX_STALE_RETRIES: usize = 2;

/// Client-side cache over a REST API
///
/// Generic over the transport so tests can substitute an in-process fake.
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct QueryClient<X: Transport> {
    transport: Arc<X>,
    registry: Arc<EndpointRegistry>,
    store: Arc<Store>,
    config: ClientConfig,
    metrics: Arc<dyn CacheMetrics>,
}

impl<X: Transport> QueryClient<X> {
    /// Build a client with no metrics
    ///
    /// Must be called inside a tokio runtime; background fetches and
    /// eviction timers run on it.
    pub fn new(config: ClientConfig, registry: EndpointRegistry, transport: X) -> Result<Self> {
        Self::with_metrics(config, registry, transport, NoopMetrics)
    }

    /// Build a client reporting to `metrics`
    pub fn with_metrics<M: CacheMetrics>(
        config: ClientConfig,
        registry: EndpointRegistry,
        transport: X,
        metrics: M,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            CacheError::Configuration(format!("query client needs a tokio runtime: {e}"))
        })?;
        let metrics: Arc<dyn CacheMetrics> = Arc::new(metrics);
        let store = Arc::new(Store::new(
            runtime,
            config.keep_unused_for,
            Arc::clone(&metrics),
        ));
        debug!(target: "storefront_cache", endpoints = registry.len(), "query client ready");
        Ok(Self {
            transport: Arc::new(transport),
            registry: Arc::new(registry),
            store,
            config,
            metrics,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &X {
        &self.transport
    }

    pub(crate) fn metrics(&self) -> &dyn CacheMetrics {
        self.metrics.as_ref()
    }

    /// Read through the cache
    ///
    /// Answers a fresh entry without a request and joins an identical
    /// in-flight request. Otherwise issues one and waits for it. Request
    /// failures are captured in the returned state, not returned as `Err`.
    pub async fn query<A, T>(&self, handle: &QueryHandle<A, T>, args: &A) -> Result<QueryState<T>>
    where
        A: Serialize + Clone + Send + Sync + 'static,
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.resolve(handle, args, false).await
    }

    /// Issue a new request even if the entry is fresh
    ///
    /// A request already in flight for the entry is superseded: its
    /// response is discarded when it arrives.
    pub async fn refetch<A, T>(
        &self,
        handle: &QueryHandle<A, T>,
        args: &A,
    ) -> Result<QueryState<T>>
    where
        A: Serialize + Clone + Send + Sync + 'static,
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.resolve(handle, args, true).await
    }

    /// Current state of an entry without side effects
    pub fn snapshot<A, T>(&self, handle: &QueryHandle<A, T>, args: &A) -> Result<QueryState<T>>
    where
        A: Serialize + Clone + Send + Sync + 'static,
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.ensure_registered(handle.name(), handle.registry, EndpointKind::Query)?;
        let key = handle.key(args)?;
        Ok(self
            .store
            .peek(&key)
            .map(|snapshot| snapshot.typed())
            .unwrap_or_default())
    }

    /// Subscribe with a fresh consumer identity
    pub fn subscribe<A, T>(&self, handle: &QueryHandle<A, T>, args: &A) -> Result<Subscription<T>>
    where
        A: Serialize + Clone + Send + Sync + 'static,
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.subscribe_as(handle, args, ConsumerId::next())
    }

    /// Subscribe on behalf of `consumer`
    ///
    /// Fetches if the entry is new, or stale with no other subscriber.
    pub fn subscribe_as<A, T>(
        &self,
        handle: &QueryHandle<A, T>,
        args: &A,
        consumer: ConsumerId,
    ) -> Result<Subscription<T>>
    where
        A: Serialize + Clone + Send + Sync + 'static,
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.ensure_registered(handle.name(), handle.registry, EndpointKind::Query)?;
        let key = handle.key(args)?;
        let rx = self
            .store
            .subscribe(&key, consumer, || self.fetcher(handle, args));
        Ok(Subscription::new(key, consumer, rx, Arc::clone(&self.store)))
    }

    /// Run a mutation
    ///
    /// Never cached or deduplicated. On success the declared tags are
    /// invalidated before this returns; on failure nothing is touched.
    pub async fn mutate<A, T>(&self, handle: &MutationHandle<A, T>, args: &A) -> Result<T>
    where
        A: Send + Sync + 'static,
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.ensure_registered(handle.name(), handle.registry, EndpointKind::Mutation)?;
        let request = (handle.def.request)(args)?;
        let timeout = handle.def.timeout.unwrap_or(self.config.request_timeout);

        self.store.count_mutation();
        debug!(target: "storefront_cache", endpoint = handle.name(), method = %request.method, path = %request.path, "mutation started");
        let started = Instant::now();
        let result = execute::<X, T>(&self.transport, &request, timeout).await;
        self.metrics
            .record_latency(CacheOperation::Mutate, started.elapsed());

        match result {
            Ok(value) => {
                let tags = handle.invalidated_tags(&value, args);
                if !tags.is_empty() {
                    let hit = self.store.invalidate(&tags);
                    debug!(target: "storefront_cache", endpoint = handle.name(), tags = ?tags, entries = hit, "mutation invalidated tags");
                }
                Ok(value)
            }
            Err(err) => {
                warn!(target: "storefront_cache", endpoint = handle.name(), error = %err, "mutation failed");
                Err(err)
            }
        }
    }

    /// Mark every entry providing a matching tag as stale
    ///
    /// Returns the number of entries hit. Repeating the call, or reordering
    /// several calls, leaves the same state.
    pub fn invalidate_tags(&self, tags: &[Tag]) -> usize {
        self.store.invalidate(tags)
    }

    /// Tags the entry for `args` currently provides
    pub fn provided_tags<A, T>(&self, handle: &QueryHandle<A, T>, args: &A) -> Result<Vec<Tag>>
    where
        A: Serialize + Clone + Send + Sync + 'static,
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let key = handle.key(args)?;
        Ok(self.store.provided(&key))
    }

    /// Number of live subscriptions to the entry for `args`
    pub fn subscriber_count<A, T>(&self, handle: &QueryHandle<A, T>, args: &A) -> Result<usize>
    where
        A: Serialize + Clone + Send + Sync + 'static,
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let key = handle.key(args)?;
        Ok(self.store.subscriber_count(&key))
    }

    /// Whether an entry exists for `key`
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.store.contains(key)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, e.g. when the signed-in user changes
    pub fn reset(&self) -> usize {
        self.store.clear()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    async fn resolve<A, T>(
        &self,
        handle: &QueryHandle<A, T>,
        args: &A,
        force: bool,
    ) -> Result<QueryState<T>>
    where
        A: Serialize + Clone + Send + Sync + 'static,
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.ensure_registered(handle.name(), handle.registry, EndpointKind::Query)?;
        let key = handle.key(args)?;

        let mut force = force;
        let mut attempt = 0;
        loop {
            let (mut rx, resolution) = self
                .store
                .request(&key, || self.fetcher(handle, args), force);
            let seq = match resolution {
                Resolution::Cached => return Ok(rx.borrow().typed()),
                Resolution::Await(seq) => seq,
            };

            let snapshot = rx
                .wait_for(|s| s.settled_seq >= seq)
                .await
                .map_err(|_| CacheError::Internal(format!("cache entry {key} was removed while fetching")))?
                .clone();

            if !snapshot.is_stale() || attempt >= MAX_STALE_RETRIES {
                return Ok(snapshot.typed());
            }
            debug!(target: "storefront_cache", key = %key, "response invalidated in flight, retrying");
            attempt += 1;
            force = false;
        }
    }

    /// Type-erased fetch for one entry
    fn fetcher<A, T>(&self, handle: &QueryHandle<A, T>, args: &A) -> FetchFn
    where
        A: Serialize + Clone + Send + Sync + 'static,
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let def = Arc::clone(&handle.def);
        let transport = Arc::clone(&self.transport);
        let timeout = def.timeout.unwrap_or(self.config.request_timeout);
        let args = args.clone();

        Arc::new(move || {
            let def = Arc::clone(&def);
            let transport = Arc::clone(&transport);
            let args = args.clone();
            async move {
                let result = match (def.request)(&args) {
                    Ok(request) => execute::<X, T>(&transport, &request, timeout)
                        .await
                        .map(Arc::new),
                    Err(err) => Err(err),
                };
                let tags = (def.provides)(result.as_deref().ok(), &args);
                FetchOutcome {
                    result: result.map(|data| data as Payload),
                    tags,
                }
            }
            .boxed()
        })
    }

    fn ensure_registered(&self, name: &str, registry: RegistryId, kind: EndpointKind) -> Result<()> {
        if registry != self.registry.id() {
            return Err(CacheError::Configuration(format!(
                "endpoint {name:?} was registered with another registry"
            )));
        }
        match self.registry.kind(name) {
            Some(registered) if registered == kind => Ok(()),
            Some(registered) => Err(CacheError::Configuration(format!(
                "endpoint {name:?} is a {registered:?}, not a {kind:?}"
            ))),
            None => Err(CacheError::Configuration(format!(
                "endpoint {name:?} is not registered with this client"
            ))),
        }
    }
}

/// Send one request and decode its (possibly enveloped) body
async fn execute<X, T>(transport: &X, request: &Request, timeout: Duration) -> Result<T>
where
    X: Transport + ?Sized,
    T: DeserializeOwned,
{
    let body = tokio::time::timeout(timeout, transport.execute(request))
        .await
        .map_err(|_| CacheError::Timeout)??;
    let body = unwrap_envelope(body)?;
    serde_json::from_value(body)
        .map_err(|e| CacheError::Decode(format!("{} {}: {e}", request.method, request.path)))
}
