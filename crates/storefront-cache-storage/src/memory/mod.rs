//! In-memory local store

mod backend;

pub use backend::{MemoryConfig, MemoryStore, MemoryStoreStats};
