//! storefront-cache: client-side query cache for storefront REST APIs
//!
//! # Features
//!
//! - **Request deduplication**: identical concurrent reads share one request
//! - **Tag invalidation**: mutations mark dependent reads stale
//! - **Subscriptions** with reference-counted eviction after a grace period
//! - **Stale-while-revalidate**: failures keep the last good data visible
//! - **Cart reconciliation** of a locally held cart at login
//! - **Metrics integration**
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use storefront_cache::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize)]
//! struct BrandArgs { plant: String }
//!
//! #[derive(Deserialize)]
//! struct Brand { id: u64, name: String }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = EndpointRegistry::new();
//!     let brands = registry.register_query(
//!         QueryDef::new("getAllBrands", |a: &BrandArgs| {
//!             Ok(Request::get("/brands").param("plant", &a.plant))
//!         })
//!         .provides(|brands: Option<&Vec<Brand>>, _| {
//!             let mut tags: Vec<Tag> =
//!                 brands.into_iter().flatten().map(|b| Tag::id("Brand", b.id)).collect();
//!             tags.push(Tag::list("Brand"));
//!             tags
//!         }),
//!     )?;
//!
//!     let transport = HttpTransport::new(HttpConfig::new("https://api.shop.test/v1")?)?;
//!     let client = QueryClient::new(ClientConfig::default(), registry, transport)?;
//!
//!     let state = client.query(&brands, &BrandArgs { plant: "A".into() }).await?;
//!     for brand in state.value().into_iter().flatten() {
//!         println!("{}: {}", brand.id, brand.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cart;
mod config;
mod manager;
mod registry;

// Re-export core
pub use storefront_cache_core::*;

// Re-export storage
#[cfg(feature = "memory")]
pub use storefront_cache_storage::{MemoryConfig, MemoryStore};

#[cfg(feature = "file")]
pub use storefront_cache_storage::{FileConfig, FileStore};

// Re-export transport
#[cfg(feature = "http")]
pub use storefront_cache_http::{HttpConfig, HttpTransport};

pub use config::ClientConfig;
pub use manager::{ConsumerId, QueryClient, Subscription};
pub use registry::{
    EndpointKind, EndpointRegistry, MutationDef, MutationHandle, QueryDef, QueryHandle,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cart::{CartEndpoints, CartLine, CartReconciler, LocalCart, ReconcileState};
    pub use crate::{
        CacheError, CacheKey, ClientConfig, EndpointRegistry, MutationDef, QueryClient, QueryDef,
        QueryState, QueryStatus, Request, Result, Subscription, Tag,
    };

    #[cfg(feature = "memory")]
    pub use crate::{MemoryConfig, MemoryStore};

    #[cfg(feature = "file")]
    pub use crate::{FileConfig, FileStore};

    #[cfg(feature = "http")]
    pub use crate::{HttpConfig, HttpTransport};
}
