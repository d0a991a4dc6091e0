use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use storefront_cache::prelude::*;
use storefront_cache::{TracingMetrics, Transport};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

struct EchoApi;

#[async_trait]
impl Transport for EchoApi {
    async fn execute(&self, request: &Request) -> Result<Value> {
        Ok(json!({"results": {"path": request.path}, "message": "ok", "statusCode": 200}))
    }
}

#[derive(Clone, Serialize)]
struct ColorArgs {
    id: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing subscriber
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE) // TRACE shows latency and hit/miss events
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| CacheError::Configuration(e.to_string()))?;

    println!("🔍 Initialized tracing...");

    // 2. Build the client with TracingMetrics
    let mut registry = EndpointRegistry::new();
    let color = registry.register_query(
        QueryDef::<ColorArgs, Value>::new("getColor", |a| {
            Ok(Request::get(format!("/colors/{}", a.id)))
        })
        .provides(|_, a| vec![Tag::id("Color", a.id)]),
    )?;
    let metrics = TracingMetrics::new().with_service_name("example-service");
    let client = QueryClient::with_metrics(ClientConfig::default(), registry, EchoApi, metrics)?;

    println!("\n⚡ First read (miss)...");
    client.query(&color, &ColorArgs { id: 1 }).await?;

    println!("\n⚡ Second read (hit)...");
    client.query(&color, &ColorArgs { id: 1 }).await?;

    println!("\n⚡ Invalidate and read again (stale hit)...");
    client.invalidate_tags(&[Tag::id("Color", 1)]);
    client.query(&color, &ColorArgs { id: 1 }).await?;

    println!("\n✅ Check your console output for structured logs!");
    Ok(())
}
