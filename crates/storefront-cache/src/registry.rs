//! Endpoint registry: declarative query and mutation definitions

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use storefront_cache_core::{CacheError, CacheKey, Request, Result, Tag};

type RequestFn<A> = Arc<dyn Fn(&A) -> Result<Request> + Send + Sync>;
type KeyFn<A> = Arc<dyn Fn(&A) -> Value + Send + Sync>;
type ProvidesFn<A, T> = Arc<dyn Fn(Option<&T>, &A) -> Vec<Tag> + Send + Sync>;
type InvalidatesFn<A, T> = Arc<dyn Fn(&T, &A) -> Vec<Tag> + Send + Sync>;

/// Whether an endpoint reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Query,
    Mutation,
}

/// Declaration of a cached read
///
/// `A` is the argument type, `T` the decoded result.
///
/// ```rust,ignore
/// let brands = QueryDef::new("getAllBrands", |a: &BrandArgs| {
///     Ok(Request::get("/brands").param("plant", &a.plant))
/// })
/// .provides(|brands: Option<&Vec<Brand>>, _| {
///     let mut tags: Vec<Tag> = brands
///         .into_iter()
///         .flatten()
///         .map(|b| Tag::id("Brand", b.id))
///         .collect();
///     tags.push(Tag::list("Brand"));
///     tags
/// });
/// ```
pub struct QueryDef<A, T> {
    pub(crate) name: String,
    pub(crate) request: RequestFn<A>,
    pub(crate) key: Option<KeyFn<A>>,
    pub(crate) provides: ProvidesFn<A, T>,
    pub(crate) timeout: Option<Duration>,
}

impl<A, T> QueryDef<A, T>
where
    A: Serialize + Clone + Send + Sync + 'static,
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Declare a query with its request builder
    pub fn new<F>(name: impl Into<String>, request: F) -> Self
    where
        F: Fn(&A) -> Result<Request> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            request: Arc::new(request),
            key: None,
            provides: Arc::new(|_, _| Vec::new()),
            timeout: None,
        }
    }

    /// Derive the cache key from a projection of the arguments
    ///
    /// The projection must include every argument that changes the
    /// response. By default the whole argument value is used.
    pub fn key<F>(mut self, key: F) -> Self
    where
        F: Fn(&A) -> Value + Send + Sync + 'static,
    {
        self.key = Some(Arc::new(key));
        self
    }

    /// Tags provided by a settled result
    ///
    /// Called with `None` when the request failed, so a failed entry can
    /// still be reached by invalidation of its collection.
    pub fn provides<F>(mut self, provides: F) -> Self
    where
        F: Fn(Option<&T>, &A) -> Vec<Tag> + Send + Sync + 'static,
    {
        self.provides = Arc::new(provides);
        self
    }

    /// Override the client's request timeout for this endpoint
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Declaration of a side-effecting write
pub struct MutationDef<A, T> {
    pub(crate) name: String,
    pub(crate) request: RequestFn<A>,
    pub(crate) invalidates: InvalidatesFn<A, T>,
    pub(crate) timeout: Option<Duration>,
}

impl<A, T> MutationDef<A, T>
where
    A: Send + Sync + 'static,
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Declare a mutation with its request builder
    pub fn new<F>(name: impl Into<String>, request: F) -> Self
    where
        F: Fn(&A) -> Result<Request> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            request: Arc::new(request),
            invalidates: Arc::new(|_, _| Vec::new()),
            timeout: None,
        }
    }

    /// Tags invalidated after the mutation succeeds
    ///
    /// Must name every collection the write can change, not just the
    /// instance: a delete invalidates `Brand:3` and `Brand:LIST`.
    pub fn invalidates<F>(mut self, invalidates: F) -> Self
    where
        F: Fn(&T, &A) -> Vec<Tag> + Send + Sync + 'static,
    {
        self.invalidates = Arc::new(invalidates);
        self
    }

    /// Override the client's request timeout for this endpoint
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Typed handle to a registered query
pub struct QueryHandle<A, T> {
    pub(crate) def: Arc<QueryDef<A, T>>,
    pub(crate) registry: RegistryId,
}

impl<A, T> QueryHandle<A, T>
where
    A: Serialize + Clone + Send + Sync + 'static,
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Endpoint name
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Cache key for the given arguments
    pub fn key(&self, args: &A) -> Result<CacheKey> {
        match &self.def.key {
            Some(key) => Ok(CacheKey::from_value(&self.def.name, key(args))),
            None => CacheKey::new(&self.def.name, args),
        }
    }

    /// Request the endpoint would send for `args`
    pub fn request(&self, args: &A) -> Result<Request> {
        (self.def.request)(args)
    }
}

impl<A, T> Clone for QueryHandle<A, T> {
    fn clone(&self) -> Self {
        Self {
            def: self.def.clone(),
            registry: self.registry,
        }
    }
}

impl<A, T> fmt::Debug for QueryHandle<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHandle").field("name", &self.def.name).finish()
    }
}

/// Typed handle to a registered mutation
pub struct MutationHandle<A, T> {
    pub(crate) def: Arc<MutationDef<A, T>>,
    pub(crate) registry: RegistryId,
}

impl<A, T> MutationHandle<A, T> {
    /// Endpoint name
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Tags a successful call with `result` and `args` invalidates
    pub fn invalidated_tags(&self, result: &T, args: &A) -> Vec<Tag> {
        (self.def.invalidates)(result, args)
    }
}

impl<A, T> Clone for MutationHandle<A, T> {
    fn clone(&self) -> Self {
        Self {
            def: self.def.clone(),
            registry: self.registry,
        }
    }
}

impl<A, T> fmt::Debug for MutationHandle<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationHandle")
            .field("name", &self.def.name)
            .finish()
    }
}

/// Process-unique identity of one registry, stamped on its handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RegistryId(u64);

impl RegistryId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        RegistryId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Static table of every endpoint the client may call
///
/// Names are unique across queries and mutations. The registry is moved
/// into the client at construction, after which no endpoint can be added.
/// Handles only work with the registry that issued them.
#[derive(Debug)]
pub struct EndpointRegistry {
    id: RegistryId,
    endpoints: BTreeMap<String, EndpointKind>,
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self {
            id: RegistryId::next(),
            endpoints: BTreeMap::new(),
        }
    }
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn id(&self) -> RegistryId {
        self.id
    }

    /// Register a query
    ///
    /// Fails with `Configuration` if the name is taken.
    pub fn register_query<A, T>(&mut self, def: QueryDef<A, T>) -> Result<QueryHandle<A, T>>
    where
        A: Serialize + Clone + Send + Sync + 'static,
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.claim(&def.name, EndpointKind::Query)?;
        Ok(QueryHandle {
            def: Arc::new(def),
            registry: self.id,
        })
    }

    /// Register a mutation
    ///
    /// Fails with `Configuration` if the name is taken.
    pub fn register_mutation<A, T>(
        &mut self,
        def: MutationDef<A, T>,
    ) -> Result<MutationHandle<A, T>>
    where
        A: Send + Sync + 'static,
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.claim(&def.name, EndpointKind::Mutation)?;
        Ok(MutationHandle {
            def: Arc::new(def),
            registry: self.id,
        })
    }

    fn claim(&mut self, name: &str, kind: EndpointKind) -> Result<()> {
        if name.is_empty() {
            return Err(CacheError::Configuration("endpoint name must not be empty".into()));
        }
        if let Some(existing) = self.endpoints.get(name) {
            return Err(CacheError::Configuration(format!(
                "duplicate endpoint {name:?} (already registered as {existing:?})"
            )));
        }
        self.endpoints.insert(name.to_string(), kind);
        Ok(())
    }

    /// Kind of a registered endpoint
    pub fn kind(&self, name: &str) -> Option<EndpointKind> {
        self.endpoints.get(name).copied()
    }

    /// Registered endpoint names with their kinds, sorted by name
    pub fn endpoints(&self) -> impl Iterator<Item = (&str, EndpointKind)> {
        self.endpoints.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize)]
    struct BrandArgs {
        plant: String,
        page: u32,
    }

    fn brands_def() -> QueryDef<BrandArgs, Vec<Value>> {
        QueryDef::new("getAllBrands", |a: &BrandArgs| {
            Ok(Request::get("/brands").param("plant", &a.plant))
        })
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = EndpointRegistry::new();
        registry.register_query(brands_def()).unwrap();

        let err = registry.register_query(brands_def()).unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));
    }

    #[test]
    fn test_names_shared_between_kinds() {
        let mut registry = EndpointRegistry::new();
        registry.register_query(brands_def()).unwrap();

        let err = registry
            .register_mutation(MutationDef::<(), Value>::new("getAllBrands", |_| {
                Ok(Request::post("/brands"))
            }))
            .unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));
        assert_eq!(registry.kind("getAllBrands"), Some(EndpointKind::Query));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_default_key_uses_all_args() {
        let mut registry = EndpointRegistry::new();
        let handle = registry.register_query(brands_def()).unwrap();

        let a = handle.key(&BrandArgs { plant: "A".into(), page: 1 }).unwrap();
        let b = handle.key(&BrandArgs { plant: "A".into(), page: 2 }).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), r#"getAllBrands({"page":1,"plant":"A"})"#);
    }

    #[test]
    fn test_custom_key_projection() {
        let mut registry = EndpointRegistry::new();
        let handle = registry
            .register_query(brands_def().key(|a| json!({ "plant": a.plant })))
            .unwrap();

        let a = handle.key(&BrandArgs { plant: "A".into(), page: 1 }).unwrap();
        let b = handle.key(&BrandArgs { plant: "A".into(), page: 2 }).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mutation_invalidation_set() {
        let mut registry = EndpointRegistry::new();
        let delete = registry
            .register_mutation(
                MutationDef::<u64, Value>::new("deleteBrand", |id| {
                    Ok(Request::delete(format!("/brands/{id}")))
                })
                .invalidates(|_, id| vec![Tag::id("Brand", id), Tag::list("Brand")]),
            )
            .unwrap();

        let tags = delete.invalidated_tags(&Value::Null, &3);
        assert_eq!(tags, vec![Tag::id("Brand", 3), Tag::list("Brand")]);
    }

    #[test]
    fn test_handles_stamped_with_issuing_registry() {
        let mut first = EndpointRegistry::new();
        let mut second = EndpointRegistry::new();
        let a = first.register_query(brands_def()).unwrap();
        let b = second.register_query(brands_def()).unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(a.registry, first.id());
        assert_eq!(b.clone().registry, second.id());
    }

    #[test]
    fn test_endpoints_listing() {
        let mut registry = EndpointRegistry::new();
        registry.register_query(brands_def()).unwrap();
        registry
            .register_mutation(MutationDef::<(), Value>::new("addBrand", |_| {
                Ok(Request::post("/brands"))
            }))
            .unwrap();

        let listed: Vec<_> = registry.endpoints().collect();
        assert_eq!(
            listed,
            vec![
                ("addBrand", EndpointKind::Mutation),
                ("getAllBrands", EndpointKind::Query)
            ]
        );
    }
}
