//! Service configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DiskCacheConfig;
use crate::config::{DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_MEMORY_CACHE_SIZE};

/// Configuration for an [`ImageService`](super::ImageService).
///
/// # Example
///
/// ```
/// use imgcache::service::ServiceConfig;
/// use std::time::Duration;
///
/// let config = ServiceConfig::default()
///     .with_memory_cache_size(64 * 1024 * 1024)
///     .with_disk_cache_directory("/tmp/imgcache-doc")
///     .with_fetch_timeout(Duration::from_secs(10));
///
/// assert_eq!(config.memory_cache_size, 64 * 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Memory tier capacity in decoded bytes
    pub memory_cache_size: usize,
    /// Persistent tier settings
    pub disk: DiskCacheConfig,
    /// Whether to start the persistent tier at all
    pub disk_cache_enabled: bool,
    /// HTTP timeout for the default fetcher
    pub fetch_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            memory_cache_size: DEFAULT_MEMORY_CACHE_SIZE,
            disk: DiskCacheConfig::default(),
            disk_cache_enabled: true,
            fetch_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        }
    }
}

impl ServiceConfig {
    pub fn with_memory_cache_size(mut self, bytes: usize) -> Self {
        self.memory_cache_size = bytes;
        self
    }

    pub fn with_disk_cache_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.disk.directory = directory.into();
        self
    }

    pub fn with_disk_cache_size(mut self, bytes: u64) -> Self {
        self.disk.max_size_bytes = bytes;
        self
    }

    /// Maximum age of persisted entries; `None` keeps them until evicted by size.
    pub fn with_disk_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.disk.max_age = max_age;
        self
    }

    pub fn with_disk_gc_interval(mut self, interval: Duration) -> Self {
        self.disk.gc_interval = interval;
        self
    }

    /// Run memory-only: nothing is persisted.
    pub fn without_disk_cache(mut self) -> Self {
        self.disk_cache_enabled = false;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}
