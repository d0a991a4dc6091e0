//! storefront-cache-storage: Local storage backends for storefront-cache

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "file")]
pub mod file;

#[cfg(feature = "memory")]
pub use memory::{MemoryConfig, MemoryStore, MemoryStoreStats};

#[cfg(feature = "file")]
pub use file::{FileConfig, FileStore};
