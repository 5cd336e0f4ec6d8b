//! TTL-based memoization of cacheable operation results.
//!
//! This module provides:
//! - Deterministic cache keys from an operation name and its parameters
//! - A concurrent in-memory result cache
//! - A background sweep that physically removes expired entries

mod key;
mod store;

pub use key::{cache_key, canonical_json};
pub use store::{CacheStats, ResultCache, SweeperHandle};
