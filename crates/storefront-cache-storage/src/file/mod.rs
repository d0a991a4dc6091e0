//! JSON-file local store

mod backend;

pub use backend::{FileConfig, FileStore};
