//! Core types for cache operations

mod envelope;
mod key;
mod request;
mod state;
mod stats;
mod tag;

pub use envelope::{Envelope, error_message, is_envelope, unwrap_envelope};
pub use key::{CacheKey, canonicalize};
pub use request::Request;
pub use state::{QueryState, QueryStatus};
pub use stats::CacheStats;
pub use tag::{LIST_ID, Tag};
