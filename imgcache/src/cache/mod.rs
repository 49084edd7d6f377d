//! Two-tier image cache.
//!
//! The memory tier holds decoded images with LRU eviction; the persistent
//! tier holds raw bytes on disk so entries survive restarts.

mod disk;
mod memory;
mod stats;
mod r#trait;
mod types;

pub use disk::{DiskCache, GcResult};
pub use memory::MemoryCache;
pub use r#trait::{BoxFuture, NoOpPersistentCache, PersistentCache};
pub use stats::{CacheStats, DiskCacheStats, MemoryCacheStats};
pub use types::{CacheError, CacheType, DiskCacheConfig};

pub use crate::key::CacheKey;
