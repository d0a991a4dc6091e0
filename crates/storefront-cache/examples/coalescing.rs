//! Request Deduplication Example
//!
//! Fires many identical reads at once and shows that only one request
//! reaches the API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use storefront_cache::prelude::*;
use storefront_cache::Transport;

/// Slow in-process API that counts requests
#[derive(Default)]
struct SlowApi {
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for SlowApi {
    async fn execute(&self, _request: &Request) -> Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        println!("   → API call #{n}");
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(json!({
            "results": [{"id": 1, "name": "Acme"}, {"id": 2, "name": "Globex"}],
            "message": "ok",
            "statusCode": 200
        }))
    }
}

#[derive(Clone, Serialize)]
struct BrandArgs {
    plant: String,
}

#[derive(Debug, Deserialize)]
struct Brand {
    id: u64,
    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut registry = EndpointRegistry::new();
    let brands = registry.register_query(QueryDef::<BrandArgs, Vec<Brand>>::new(
        "getAllBrands",
        |a| Ok(Request::get("/brands").param("plant", &a.plant)),
    ))?;

    let api = Arc::new(SlowApi::default());
    let client = QueryClient::new(ClientConfig::default(), registry, Arc::clone(&api))?;

    println!("=== Request Deduplication Demo ===\n");
    println!("⚡ Launching 10 concurrent reads of getAllBrands(plant=A)...");

    let args = BrandArgs { plant: "A".into() };
    let reads = (0..10).map(|_| client.query(&brands, &args));
    let states = futures::future::join_all(reads).await;

    for state in states.into_iter().take(2) {
        let state = state?;
        for brand in state.value().into_iter().flatten() {
            println!("   {} => {}", brand.id, brand.name);
        }
    }

    let stats = client.stats();
    println!("\n📊 API calls: {}", api.calls.load(Ordering::SeqCst));
    println!("   Joined in-flight: {}", stats.coalesced);
    println!("\n✅ 10 reads, 1 request");
    Ok(())
}
