//! storefront-cache-http: `reqwest` transport for storefront-cache
//!
//! Turns the registry's [`Request`](storefront_cache_core::Request)
//! descriptions into HTTP calls against the storefront backend and maps
//! failures onto the cache error taxonomy.

pub mod config;
pub mod transport;

pub use config::HttpConfig;
pub use transport::HttpTransport;
