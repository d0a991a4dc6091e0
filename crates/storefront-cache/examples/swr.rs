//! Stale-While-Revalidate (SWR) Example
//!
//! A subscriber keeps showing the last good data while a refetch runs,
//! and still has it after the refetch fails.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use storefront_cache::prelude::*;
use storefront_cache::Transport;

/// Answers twice, then goes down for maintenance
#[derive(Default)]
struct FlakyApi {
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for FlakyApi {
    async fn execute(&self, _request: &Request) -> Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(100)).await;
        match n {
            1 => Ok(json!({"results": {"title": "Dashboard v1"}, "message": "ok", "statusCode": 200})),
            2 => Ok(json!({"results": {"title": "Dashboard v2"}, "message": "ok", "statusCode": 200})),
            _ => Err(CacheError::server(503, "maintenance")),
        }
    }
}

#[derive(Clone, Serialize)]
struct NoArgs {}

#[derive(Debug, Deserialize)]
struct Dashboard {
    title: String,
}

fn describe(label: &str, state: &QueryState<Dashboard>) {
    let title = state.value().map(|d| d.title.as_str()).unwrap_or("-");
    println!(
        "{label:<22} data={title:<14} fetching={:<5} error={}",
        state.is_fetching,
        state
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".into())
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut registry = EndpointRegistry::new();
    let dashboard = registry.register_query(
        QueryDef::<NoArgs, Dashboard>::new("getDashboard", |_| Ok(Request::get("/dashboard")))
            .provides(|_, _| vec![Tag::ty("Dashboard")]),
    )?;
    let client = QueryClient::new(ClientConfig::default(), registry, FlakyApi::default())?;

    println!("=== Stale-While-Revalidate Demo ===\n");

    let mut sub = client.subscribe(&dashboard, &NoArgs {})?;
    describe("subscribed", &sub.current());
    describe("first load", &sub.settled().await?);

    // Subscribed entries refetch as soon as they are invalidated
    client.invalidate_tags(&[Tag::ty("Dashboard")]);
    describe("invalidated", &sub.current());
    describe("revalidated", &sub.settled().await?);

    // The API is down now; old data survives next to the error
    let failed = client.refetch(&dashboard, &NoArgs {}).await?;
    describe("refetch failed", &failed);

    println!("\n✅ SWR behavior demonstrated!");
    Ok(())
}
