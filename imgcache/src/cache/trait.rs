//! Persistent cache trait definition for dependency injection.

use std::future::Future;
use std::pin::Pin;

use crate::cache::{CacheError, DiskCacheStats};
use crate::key::CacheKey;

/// Boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable store of raw (undecoded) image bytes keyed by [`CacheKey`].
///
/// Absence is never an error: a missing entry is `Ok(false)` / `Ok(None)`.
/// `Err` is reserved for storage faults, which callers treat as a miss.
///
/// Implementations must make writes atomic with respect to readers: a
/// concurrent `read` sees either the previous entry, nothing, or the complete
/// new bytes.
pub trait PersistentCache: Send + Sync {
    /// Whether an entry exists for `key`.
    fn exists<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, Result<bool, CacheError>>;

    /// Read the bytes for `key`.
    fn read<'a>(&'a self, key: &'a CacheKey)
        -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>>;

    /// Store bytes for `key`, replacing any existing entry.
    fn write<'a>(&'a self, key: &'a CacheKey, data: Vec<u8>)
        -> BoxFuture<'a, Result<(), CacheError>>;

    /// Remove the entry for `key`. Returns whether it was present.
    fn remove<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, Result<bool, CacheError>>;

    /// Remove every entry.
    fn clear(&self) -> BoxFuture<'_, Result<(), CacheError>>;

    /// Counter snapshot.
    fn stats(&self) -> DiskCacheStats;
}

/// Persistent cache that stores nothing.
///
/// Every lookup misses and every write is accepted and discarded. Useful for
/// running the service memory-only and in tests.
#[derive(Debug, Clone, Default)]
pub struct NoOpPersistentCache;

impl PersistentCache for NoOpPersistentCache {
    fn exists<'a>(&'a self, _key: &'a CacheKey) -> BoxFuture<'a, Result<bool, CacheError>> {
        Box::pin(async { Ok(false) })
    }

    fn read<'a>(
        &'a self,
        _key: &'a CacheKey,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>> {
        Box::pin(async { Ok(None) })
    }

    fn write<'a>(
        &'a self,
        _key: &'a CacheKey,
        _data: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async { Ok(()) })
    }

    fn remove<'a>(&'a self, _key: &'a CacheKey) -> BoxFuture<'a, Result<bool, CacheError>> {
        Box::pin(async { Ok(false) })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async { Ok(()) })
    }

    fn stats(&self) -> DiskCacheStats {
        DiskCacheStats::default()
    }
}
