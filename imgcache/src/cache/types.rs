//! Core types for the cache tiers.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::{
    default_cache_directory, DEFAULT_DISK_CACHE_SIZE, DEFAULT_DISK_GC_INTERVAL_SECS,
    DEFAULT_DISK_MAX_AGE_DAYS,
};

/// Scope of an invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheType {
    /// In-process decoded images only
    Memory,
    /// Persistent raw bytes only
    Disk,
    /// Both tiers
    All,
}

impl CacheType {
    /// Whether this scope includes the memory tier.
    pub fn includes_memory(self) -> bool {
        matches!(self, Self::Memory | Self::All)
    }

    /// Whether this scope includes the persistent tier.
    pub fn includes_disk(self) -> bool {
        matches!(self, Self::Disk | Self::All)
    }
}

/// Storage faults raised by the cache tiers.
///
/// Absence of an entry is never an error; it is reported as `None`/`false`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking filesystem task could not be joined
    #[error("Cache task failed: {0}")]
    SpawnError(String),

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

/// Persistent cache configuration.
#[derive(Debug, Clone)]
pub struct DiskCacheConfig {
    /// Cache directory root
    pub directory: PathBuf,
    /// Maximum disk size in bytes (default: 1 GB)
    pub max_size_bytes: u64,
    /// Entries older than this are treated as absent and collected
    pub max_age: Option<Duration>,
    /// Interval between GC cycles (default: 60s)
    pub gc_interval: Duration,
}

impl DiskCacheConfig {
    /// Create a configuration rooted at `directory` with default limits.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Set the size limit in bytes.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    /// Set the maximum entry age. `None` disables age-based expiry.
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the GC interval.
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval;
        self
    }
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            max_size_bytes: DEFAULT_DISK_CACHE_SIZE as u64,
            max_age: Some(Duration::from_secs(
                DEFAULT_DISK_MAX_AGE_DAYS as u64 * 24 * 60 * 60,
            )),
            gc_interval: Duration::from_secs(DEFAULT_DISK_GC_INTERVAL_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_type_scopes() {
        assert!(CacheType::Memory.includes_memory());
        assert!(!CacheType::Memory.includes_disk());
        assert!(CacheType::Disk.includes_disk());
        assert!(!CacheType::Disk.includes_memory());
        assert!(CacheType::All.includes_memory());
        assert!(CacheType::All.includes_disk());
    }

    #[test]
    fn test_disk_cache_config_default() {
        let config = DiskCacheConfig::default();
        assert_eq!(config.max_size_bytes, DEFAULT_DISK_CACHE_SIZE as u64);
        assert_eq!(config.gc_interval, Duration::from_secs(60));
        assert_eq!(config.max_age, Some(Duration::from_secs(30 * 24 * 60 * 60)));
        assert!(config.directory.ends_with("imgcache"));
    }

    #[test]
    fn test_disk_cache_config_builder() {
        let config = DiskCacheConfig::new("/tmp/imgcache-test")
            .with_max_size(10_000)
            .with_max_age(None)
            .with_gc_interval(Duration::from_secs(5));

        assert_eq!(config.directory, PathBuf::from("/tmp/imgcache-test"));
        assert_eq!(config.max_size_bytes, 10_000);
        assert!(config.max_age.is_none());
        assert_eq!(config.gc_interval, Duration::from_secs(5));
    }
}
