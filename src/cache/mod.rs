//! Keyed query cache for API reads.
//!
//! This module provides a resource-agnostic caching mechanism that:
//! - Serves reads from memory while they are younger than the staleness window
//! - Refetches on a miss, retrying a failed fetch once
//! - Supports invalidating a single key or a whole scope after a mutation

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{MemoryStorage, NoopStorage};
pub use traits::{CacheSource, QueryKey};
