//! storefront-cache-core: Core traits and types for the storefront-cache library
//!
//! This crate provides the error taxonomy, keys, tags, request and state
//! types, and the transport/storage/metrics traits shared by the other
//! storefront-cache crates.

mod error;
mod traits;
mod types;

pub use error::{CacheError, Result};
pub use traits::*;
pub use types::*;
