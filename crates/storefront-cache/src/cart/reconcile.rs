//! Login-time reconciliation of the local cart with the server

use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use storefront_cache_core::{
    CacheError, CacheOperation, LocalStore, QueryState, Request, Result, Tag, Transport,
};

use super::lines::{CartLine, ProductQuery, ProductSnapshot, ReconciledCartLine, merge_lines};
use super::local::LocalCart;
use crate::manager::QueryClient;
use crate::registry::{EndpointRegistry, MutationDef, MutationHandle, QueryDef, QueryHandle};

/// Endpoints reconciliation reads and writes through
#[derive(Debug, Clone)]
pub struct CartEndpoints {
    /// Product lookup by id and size; `null` when the product is gone
    pub product: QueryHandle<ProductQuery, Option<ProductSnapshot>>,
    /// Full replacement of the server-side cart
    pub replace_cart: MutationHandle<Vec<ReconciledCartLine>, Value>,
}

impl CartEndpoints {
    /// Register the default storefront endpoints
    ///
    /// `getProductDetail` is `GET /products/{id}?size=..` and provides
    /// `Product:{id}`. `replaceCart` is `PUT /cart` and invalidates `Cart`.
    pub fn register(registry: &mut EndpointRegistry) -> Result<Self> {
        let product = registry.register_query(
            QueryDef::new("getProductDetail", |q: &ProductQuery| {
                Ok(Request::get(format!("/products/{}", q.product_id)).param("size", &q.size))
            })
            .provides(|_, q: &ProductQuery| vec![Tag::id("Product", &q.product_id)]),
        )?;
        let replace_cart = registry.register_mutation(
            MutationDef::new("replaceCart", |lines: &Vec<ReconciledCartLine>| {
                Request::put("/cart").json(lines)
            })
            .invalidates(|_, _| vec![Tag::ty("Cart")]),
        )?;
        Ok(Self {
            product,
            replace_cart,
        })
    }
}

/// Where the current login session's reconciliation stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReconcileState {
    #[default]
    Idle,
    Reconciling,
    /// Pushed to the server; the local cart is in sync
    Reconciled(Vec<ReconciledCartLine>),
    /// Lookup or push failed; the local cart is untouched
    Failed(CacheError),
}

impl ReconcileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileState::Idle => "idle",
            ReconcileState::Reconciling => "reconciling",
            ReconcileState::Reconciled(_) => "reconciled",
            ReconcileState::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Default)]
struct Session {
    state: ReconcileState,
    /// Bumped on logout so a pass outliving its session is ignored
    generation: u64,
}

/// Merges the local cart into the server cart once per login
pub struct CartReconciler<X: Transport, S: LocalStore> {
    client: Arc<QueryClient<X>>,
    endpoints: CartEndpoints,
    cart: LocalCart<S>,
    session: Mutex<Session>,
}

impl<X: Transport, S: LocalStore> CartReconciler<X, S> {
    pub fn new(client: Arc<QueryClient<X>>, endpoints: CartEndpoints, cart: LocalCart<S>) -> Self {
        Self {
            client,
            endpoints,
            cart,
            session: Mutex::new(Session::default()),
        }
    }

    pub fn state(&self) -> ReconcileState {
        self.session.lock().state.clone()
    }

    /// Whether the server cart matches the local one for this session
    pub fn is_synced(&self) -> bool {
        matches!(self.session.lock().state, ReconcileState::Reconciled(_))
    }

    pub fn cart(&self) -> &LocalCart<S> {
        &self.cart
    }

    /// Reconcile after sign-in
    ///
    /// An empty local cart stays `Idle`. A session already reconciled
    /// returns its lines again without touching the network.
    pub async fn on_login(&self) -> Result<Vec<ReconciledCartLine>> {
        let generation = {
            let mut session = self.session.lock();
            match &session.state {
                ReconcileState::Idle => {}
                ReconcileState::Reconciled(lines) => return Ok(lines.clone()),
                ReconcileState::Reconciling => {
                    return Err(CacheError::InvalidState("reconciliation already running".into()));
                }
                ReconcileState::Failed(_) => {
                    return Err(CacheError::InvalidState(
                        "previous reconciliation failed, retry it instead".into(),
                    ));
                }
            }
            session.state = ReconcileState::Reconciling;
            session.generation
        };
        self.run(generation).await
    }

    /// Run the pass again after a failure
    pub async fn retry(&self) -> Result<Vec<ReconciledCartLine>> {
        let generation = {
            let mut session = self.session.lock();
            if !matches!(session.state, ReconcileState::Failed(_)) {
                return Err(CacheError::InvalidState(format!(
                    "retry is only possible after a failure, state is {}",
                    session.state.as_str()
                )));
            }
            session.state = ReconcileState::Reconciling;
            session.generation
        };
        self.run(generation).await
    }

    /// Forget the session and the local cart
    pub async fn on_logout(&self) -> Result<()> {
        {
            let mut session = self.session.lock();
            session.generation += 1;
            session.state = ReconcileState::Idle;
        }
        self.cart.clear().await?;
        debug!(target: "storefront_cache", "cart session ended");
        Ok(())
    }

    /// Compute the lines a pass would push, without pushing them
    ///
    /// Pure in the local cart and the server state: two calls with neither
    /// changed return the same lines.
    pub async fn plan(&self) -> Result<Vec<ReconciledCartLine>> {
        let lines = merge_lines(self.cart.lines().await?);
        self.confirm_lines(&lines).await
    }

    /// Entered with the session already marked `Reconciling`
    async fn run(&self, generation: u64) -> Result<Vec<ReconciledCartLine>> {
        let lines = match self.cart.lines().await {
            Ok(lines) => merge_lines(lines),
            Err(err) => {
                self.transition(generation, ReconcileState::Failed(err.clone()));
                return Err(err);
            }
        };
        if lines.is_empty() {
            debug!(target: "storefront_cache", "local cart empty, nothing to reconcile");
            self.transition(generation, ReconcileState::Idle);
            return Ok(Vec::new());
        }
        info!(target: "storefront_cache", lines = lines.len(), "reconciling cart");

        let started = Instant::now();
        let outcome = match self.confirm_lines(&lines).await {
            Ok(confirmed) => self
                .client
                .mutate(&self.endpoints.replace_cart, &confirmed)
                .await
                .map(|_| confirmed),
            Err(err) => Err(err),
        };
        self.client
            .metrics()
            .record_latency(CacheOperation::Reconcile, started.elapsed());

        match outcome {
            Ok(confirmed) => {
                info!(target: "storefront_cache", kept = confirmed.len(), dropped = lines.len() - confirmed.len(), "cart reconciled");
                self.transition(generation, ReconcileState::Reconciled(confirmed.clone()));
                Ok(confirmed)
            }
            Err(err) => {
                warn!(target: "storefront_cache", error = %err, "cart reconciliation failed");
                self.transition(generation, ReconcileState::Failed(err.clone()));
                Err(err)
            }
        }
    }

    /// Look up every line concurrently and confirm it against the product
    ///
    /// A lookup whose last attempt failed is sent again rather than answered
    /// from cache, so a retry after an outage reaches the server.
    async fn confirm_lines(&self, lines: &[CartLine]) -> Result<Vec<ReconciledCartLine>> {
        let lookups = lines.iter().map(|line| {
            let query = ProductQuery::from(line);
            async move {
                let product = &self.endpoints.product;
                if self.client.snapshot(product, &query)?.is_error() {
                    trace!(target: "storefront_cache", product = %query.product_id, size = %query.size, "previous lookup failed, refetching");
                    self.client.refetch(product, &query).await
                } else {
                    self.client.query(product, &query).await
                }
            }
        });
        let results = join_all(lookups).await;

        let mut confirmed = Vec::with_capacity(lines.len());
        for (line, result) in lines.iter().zip(results) {
            let Some(product) = resolve_product(result?)? else {
                debug!(target: "storefront_cache", product = %line.product_id, size = %line.size, "dropping line, product gone");
                continue;
            };
            match ReconciledCartLine::confirm(line, &product) {
                Some(reconciled) => confirmed.push(reconciled),
                None => {
                    debug!(target: "storefront_cache", product = %line.product_id, size = %line.size, "dropping line, out of stock");
                }
            }
        }
        Ok(confirmed)
    }

    /// Apply `next` if the session is still `generation`
    fn transition(&self, generation: u64, next: ReconcileState) -> bool {
        let mut session = self.session.lock();
        if session.generation != generation {
            return false;
        }
        debug!(target: "storefront_cache", from = session.state.as_str(), to = next.as_str(), "reconcile state");
        session.state = next;
        true
    }
}

/// `None` if the product no longer resolves; `Err` for any other failure
fn resolve_product(state: QueryState<Option<ProductSnapshot>>) -> Result<Option<ProductSnapshot>> {
    if let Some(err) = state.error {
        return if err.is_not_found() { Ok(None) } else { Err(err) };
    }
    match state.data {
        Some(product) => Ok((*product).clone()),
        None => Err(CacheError::Internal(format!(
            "product lookup is {}",
            state.status.as_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_cache_core::QueryStatus;

    fn fulfilled(product: Option<ProductSnapshot>) -> QueryState<Option<ProductSnapshot>> {
        QueryState {
            status: QueryStatus::Fulfilled,
            data: Some(Arc::new(product)),
            ..QueryState::uninitialized()
        }
    }

    fn rejected(err: CacheError) -> QueryState<Option<ProductSnapshot>> {
        QueryState {
            status: QueryStatus::Rejected,
            error: Some(err),
            ..QueryState::uninitialized()
        }
    }

    #[test]
    fn test_resolve_product() {
        let p = ProductSnapshot {
            product_id: "P1".into(),
            unit_price: 500,
            available_quantity: 10,
            promotions: Vec::new(),
        };
        assert_eq!(resolve_product(fulfilled(Some(p.clone()))).unwrap(), Some(p));
        assert_eq!(resolve_product(fulfilled(None)).unwrap(), None);
        assert_eq!(resolve_product(rejected(CacheError::server(404, "gone"))).unwrap(), None);
        assert_eq!(resolve_product(rejected(CacheError::server(410, "gone"))).unwrap(), None);
        assert_eq!(
            resolve_product(rejected(CacheError::Timeout)).unwrap_err(),
            CacheError::Timeout
        );
        assert_eq!(
            resolve_product(rejected(CacheError::server(500, "boom"))).unwrap_err(),
            CacheError::server(500, "boom")
        );
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ReconcileState::default().as_str(), "idle");
        assert_eq!(ReconcileState::Failed(CacheError::Timeout).as_str(), "failed");
    }
}
