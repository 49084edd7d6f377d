//! Cache statistics snapshots.

/// Memory tier counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size_bytes: usize,
    pub entry_count: usize,
}

impl MemoryCacheStats {
    /// Memory hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        hit_rate(self.hits, self.misses)
    }
}

/// Persistent tier counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub write_failures: u64,
    /// Entries removed by GC (age or size)
    pub evictions: u64,
    /// Approximate, refreshed by GC cycles
    pub size_bytes: u64,
}

impl DiskCacheStats {
    /// Disk hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        hit_rate(self.hits, self.misses)
    }
}

/// Combined statistics for both tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory: MemoryCacheStats,
    pub disk: DiskCacheStats,
}

impl CacheStats {
    /// Fraction of lookups served by either tier.
    ///
    /// A memory miss that hits disk counts once, as a hit.
    pub fn overall_hit_rate(&self) -> f64 {
        let hits = self.memory.hits + self.disk.hits;
        hit_rate(hits, self.disk.misses)
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
