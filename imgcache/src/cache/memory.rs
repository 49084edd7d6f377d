//! In-memory cache of decoded images with LRU eviction.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

use crate::cache::MemoryCacheStats;
use crate::decode::Artifact;
use crate::key::CacheKey;

/// Entry in the memory cache.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Cached image
    artifact: Artifact,
    /// Weight charged against the capacity
    size: usize,
    /// When the entry was inserted
    inserted_at: Instant,
    /// Recency stamp for LRU eviction (higher is more recent)
    last_accessed: u64,
}

/// State guarded by a single lock so size accounting never drifts from
/// the entry map.
#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    size_bytes: usize,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Bounded in-process cache for decoded images.
///
/// Capacity is measured in decoded pixel bytes. `get`, `put`, and `remove`
/// are linearizable: every operation runs under one lock.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_size_bytes: usize,
}

impl MemoryCache {
    /// Create a new memory cache with the given size limit in bytes.
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_size_bytes,
        }
    }

    /// Get a cached image, marking it as recently used.
    pub fn get(&self, key: &CacheKey) -> Option<Artifact> {
        let mut inner = self.inner.lock();
        let stamp = inner.tick();

        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_accessed = stamp;
                let artifact = entry.artifact.clone();
                inner.hits += 1;
                Some(artifact)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Put an image into the cache, replacing any existing entry for `key`.
    ///
    /// Evicts least recently used entries until the new entry fits. An image
    /// larger than the whole capacity is not cached; returns `false` in that
    /// case.
    pub fn put(&self, key: CacheKey, artifact: Artifact) -> bool {
        let size = artifact.byte_size();
        if size > self.max_size_bytes {
            debug!(
                key = %key,
                size,
                max_size_bytes = self.max_size_bytes,
                "Image larger than memory cache, not caching"
            );
            return false;
        }

        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.remove(&key) {
            inner.size_bytes -= old.size;
        }

        if inner.size_bytes + size > self.max_size_bytes {
            Self::evict_lru(&mut inner, self.max_size_bytes - size);
        }

        let stamp = inner.tick();
        inner.entries.insert(
            key,
            CacheEntry {
                artifact,
                size,
                inserted_at: Instant::now(),
                last_accessed: stamp,
            },
        );
        inner.size_bytes += size;
        true
    }

    /// Remove an entry. Returns whether it was present.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.remove(key) {
            Some(entry) => {
                inner.size_bytes -= entry.size;
                true
            }
            None => false,
        }
    }

    /// Clear all entries from the cache.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.size_bytes = 0;
    }

    /// Check if a key exists without touching recency or statistics.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// How long ago the entry for `key` was inserted.
    pub fn age(&self, key: &CacheKey) -> Option<std::time::Duration> {
        self.inner
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.inserted_at.elapsed())
    }

    /// Get the current number of entries in the cache.
    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Get the current size of the cache in bytes.
    pub fn size_bytes(&self) -> usize {
        self.inner.lock().size_bytes
    }

    /// Get the maximum size of the cache in bytes.
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    /// Snapshot of hit/miss/eviction counters and occupancy.
    pub fn stats(&self) -> MemoryCacheStats {
        let inner = self.inner.lock();
        MemoryCacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            size_bytes: inner.size_bytes,
            entry_count: inner.entries.len(),
        }
    }

    /// Evict least recently used entries until `size_bytes <= target_size`.
    fn evict_lru(inner: &mut Inner, target_size: usize) {
        let mut candidates: Vec<(CacheKey, u64)> = inner
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.last_accessed))
            .collect();
        candidates.sort_by_key(|(_, stamp)| *stamp);

        let mut evicted = 0u64;
        for (key, _) in candidates {
            if inner.size_bytes <= target_size {
                break;
            }
            if let Some(entry) = inner.entries.remove(&key) {
                inner.size_bytes -= entry.size;
                evicted += 1;
            }
        }

        inner.evictions += evicted;
        debug!(
            evicted,
            size_bytes = inner.size_bytes,
            "Memory cache LRU eviction"
        );
    }
}
