//! Cart Reconciliation Example
//!
//! A guest fills a cart offline, then signs in. The cart is checked
//! against live prices and stock and pushed to the server in one write.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use storefront_cache::Transport;
use storefront_cache::prelude::*;

/// In-process storefront API with three products
struct Storefront;

#[async_trait]
impl Transport for Storefront {
    async fn execute(&self, request: &Request) -> Result<Value> {
        println!("   → {} {}", request.method, request.path);
        let product = |id: &str, price: u64, available: u32| {
            json!({
                "results": {
                    "productId": id,
                    "unitPrice": price,
                    "availableQuantity": available,
                    "promotions": [{"id": "SPRING", "title": "Spring sale", "discountPercent": 10}]
                },
                "message": "ok",
                "statusCode": 200
            })
        };
        match request.path.as_str() {
            "/products/P1" => Ok(product("P1", 500, 10)),
            "/products/P2" => Ok(product("P2", 1200, 1)),
            "/products/P3" => Err(CacheError::server(404, "product discontinued")),
            "/cart" => Ok(json!({"results": null, "message": "cart replaced", "statusCode": 200})),
            other => Err(CacheError::server(404, format!("no route for {other}"))),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut registry = EndpointRegistry::new();
    let endpoints = CartEndpoints::register(&mut registry)?;
    let client = Arc::new(QueryClient::new(ClientConfig::default(), registry, Storefront)?);

    let cart = LocalCart::new(MemoryStore::with_defaults());
    cart.add(CartLine::new("P1", 2, "M")?).await?;
    cart.add(CartLine::new("P2", 3, "L")?).await?;
    cart.add(CartLine::new("P3", 1, "S")?).await?;
    cart.add(CartLine::new("P1", 1, "M")?).await?;

    println!("=== Cart Reconciliation Demo ===\n");
    println!("🛒 Local cart:");
    for line in cart.lines().await? {
        println!("   {} x{} ({})", line.product_id, line.quantity, line.size);
    }

    let reconciler = CartReconciler::new(client, endpoints, cart);
    println!("\n🔑 Signing in...");
    let lines = reconciler.on_login().await?;

    println!("\n📦 Server cart:");
    for line in &lines {
        println!(
            "   {} x{} ({}) @ {} = {}",
            line.product_id,
            line.quantity,
            line.size,
            line.unit_price,
            line.line_total()
        );
    }
    println!("\n   state: {}", reconciler.state().as_str());

    reconciler.on_logout().await?;
    println!("   after logout: {}", reconciler.state().as_str());
    Ok(())
}
