//! On-disk persistent cache with internal garbage collection.
//!
//! Entries are raw image bytes stored as one file per key:
//!
//! ```text
//! {cache_dir}/{key}.cache
//! ```
//!
//! Keys are hex digests, so they are already safe file names.
//!
//! # Eviction Strategy
//!
//! A background GC daemon, owned by the cache and spawned in [`DiskCache::start`],
//! runs every `gc_interval`:
//! - Entries older than `max_age` (by mtime) are deleted
//! - If the remaining total exceeds the size limit, oldest files are deleted
//!   until the cache is at 90% of the limit
//! - Empty directories are cleaned up afterwards
//!
//! Expired entries are also reported absent by `exists`/`read` between cycles.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::r#trait::{BoxFuture, PersistentCache};
use crate::cache::{CacheError, DiskCacheConfig, DiskCacheStats};
use crate::key::CacheKey;

/// Target fraction of the limit after size eviction.
const EVICTION_TARGET_PERCENTAGE: f64 = 0.9;

/// Extension of committed entries.
const ENTRY_EXTENSION: &str = "cache";

/// Outcome of a single GC cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcResult {
    /// Entries removed because they were older than the maximum age
    pub expired: usize,
    /// Entries removed to bring the cache under its size limit
    pub evicted: usize,
    /// Total bytes freed
    pub bytes_freed: u64,
    /// Size of the cache after the cycle
    pub size_after: u64,
    /// Wall time of the cycle
    pub duration_ms: u64,
}

impl GcResult {
    /// Total entries removed for any reason.
    pub fn entries_removed(&self) -> usize {
        self.expired + self.evicted
    }
}

/// Filesystem-backed [`PersistentCache`].
///
/// # Shutdown
///
/// Call [`shutdown`](Self::shutdown) to stop the GC daemon. Dropping the cache
/// also signals the daemon to stop.
pub struct DiskCache {
    directory: PathBuf,
    max_size_bytes: u64,
    max_age: Option<Duration>,
    gc_interval: Duration,

    /// Approximate cached size, refreshed by GC and adjusted on write.
    cached_size: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
    evictions: AtomicU64,

    /// Makes concurrent temp files for the same key distinct.
    temp_counter: AtomicU64,

    gc_handle: RwLock<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl DiskCache {
    /// Start a disk cache with its GC daemon.
    ///
    /// Creates the cache directory if needed. Must be called from within a
    /// Tokio runtime.
    pub async fn start(config: DiskCacheConfig) -> Result<Arc<Self>, CacheError> {
        if config.max_size_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "disk cache size must be greater than zero".to_string(),
            ));
        }

        tokio::fs::create_dir_all(&config.directory).await?;

        let cache = Arc::new(Self {
            directory: config.directory.clone(),
            max_size_bytes: config.max_size_bytes,
            max_age: config.max_age,
            gc_interval: config.gc_interval,
            cached_size: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            temp_counter: AtomicU64::new(0),
            gc_handle: RwLock::new(None),
            shutdown: CancellationToken::new(),
        });

        // Initial cycle populates the size estimate and enforces limits left
        // over from a previous run
        if let Err(e) = cache.gc().await {
            warn!(error = %e, "Initial GC cycle failed");
        }

        // The daemon holds a weak reference so dropping the last Arc stops it
        let weak = Arc::downgrade(&cache);
        let shutdown = cache.shutdown.clone();
        let interval = cache.gc_interval;
        let handle = tokio::spawn(async move {
            Self::run_gc_daemon(weak, shutdown, interval).await;
        });

        {
            let mut guard = cache.gc_handle.write().await;
            *guard = Some(handle);
        }

        info!(
            dir = %config.directory.display(),
            max_bytes = config.max_size_bytes,
            max_age_secs = config.max_age.map(|d| d.as_secs()),
            interval_secs = config.gc_interval.as_secs(),
            "Disk cache started with GC daemon"
        );

        Ok(cache)
    }

    /// Cache directory root.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Size limit in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Approximate size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.cached_size.load(Ordering::Relaxed)
    }

    /// Stop the GC daemon, waiting for any in-progress cycle to finish.
    pub async fn shutdown(&self) {
        info!("Disk cache shutting down");
        self.shutdown.cancel();

        let handle = {
            let mut guard = self.gc_handle.write().await;
            guard.take()
        };

        if let Some(handle) = handle {
            let _ = handle.await;
        }

        info!("Disk cache shutdown complete");
    }

    /// Run one GC cycle now.
    pub async fn gc(&self) -> Result<GcResult, CacheError> {
        let directory = self.directory.clone();
        let max_bytes = self.max_size_bytes;
        let max_age = self.max_age;

        let result = tokio::task::spawn_blocking(move || {
            Self::gc_cycle_blocking(&directory, max_bytes, max_age)
        })
        .await
        .map_err(|e| CacheError::SpawnError(e.to_string()))?;

        self.cached_size.store(result.size_after, Ordering::Relaxed);
        self.evictions
            .fetch_add(result.entries_removed() as u64, Ordering::Relaxed);

        if result.entries_removed() > 0 {
            info!(
                expired = result.expired,
                evicted = result.evicted,
                bytes_freed = result.bytes_freed,
                duration_ms = result.duration_ms,
                "Disk cache GC complete"
            );
        }

        Ok(result)
    }

    async fn run_gc_daemon(
        cache: std::sync::Weak<Self>,
        shutdown: CancellationToken,
        interval: Duration,
    ) {
        debug!(interval_secs = interval.as_secs(), "Disk cache GC daemon started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Disk cache GC daemon shutting down");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let Some(cache) = cache.upgrade() else {
                        break;
                    };
                    if let Err(e) = cache.gc().await {
                        warn!(error = %e, "GC cycle failed");
                    }
                }
            }
        }
    }

    /// Blocking GC implementation.
    fn gc_cycle_blocking(directory: &Path, max_bytes: u64, max_age: Option<Duration>) -> GcResult {
        let start = Instant::now();
        let now = SystemTime::now();

        let mut files = Vec::new();
        Self::collect_files_recursive(directory, &mut files);

        let mut result = GcResult::default();

        // Expiry pass
        if let Some(max_age) = max_age {
            files.retain(|(path, mtime, size)| {
                if !Self::is_expired(*mtime, now, max_age) {
                    return true;
                }
                match std::fs::remove_file(path) {
                    Ok(()) => {
                        result.expired += 1;
                        result.bytes_freed += size;
                        false
                    }
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "Failed to delete expired entry");
                        true
                    }
                }
            });
        }

        let mut remaining_size: u64 = files.iter().map(|(_, _, size)| size).sum();

        debug!(
            file_count = files.len(),
            total_size = remaining_size,
            limit = max_bytes,
            "GC cycle scan complete"
        );

        if remaining_size > max_bytes {
            let target_size = (max_bytes as f64 * EVICTION_TARGET_PERCENTAGE) as u64;

            info!(
                current_size = remaining_size,
                limit = max_bytes,
                target = target_size,
                "Disk cache over limit, starting eviction"
            );

            files.sort_by_key(|(_, mtime, _)| *mtime);

            for (path, _mtime, size) in files {
                if remaining_size <= target_size {
                    break;
                }

                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        result.bytes_freed += size;
                        remaining_size = remaining_size.saturating_sub(size);
                        result.evicted += 1;
                    }
                    Err(e) => {
                        debug!(
                            path = %path.display(),
                            error = %e,
                            "Failed to delete cache file during eviction"
                        );
                    }
                }
            }
        }

        if result.entries_removed() > 0 {
            Self::cleanup_empty_dirs(directory);
        }

        result.size_after = remaining_size;
        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    /// Recursively collect committed entries with their mtime and size.
    fn collect_files_recursive(dir: &Path, files: &mut Vec<(PathBuf, SystemTime, u64)>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Failed to read directory during GC scan");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();

            if path.is_dir() {
                Self::collect_files_recursive(&path, files);
            } else if Self::is_entry_file(&path) {
                if let Ok(metadata) = entry.metadata() {
                    let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                    files.push((path, mtime, metadata.len()));
                }
            }
        }
    }

    /// Remove empty directories below `dir`.
    fn cleanup_empty_dirs(dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                Self::cleanup_empty_dirs(&path);
                let _ = std::fs::remove_dir(&path);
            }
        }
    }

    fn is_entry_file(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
    }

    fn is_expired(mtime: SystemTime, now: SystemTime, max_age: Duration) -> bool {
        now.duration_since(mtime)
            .map(|age| age > max_age)
            .unwrap_or(false)
    }

    fn key_path(&self, key: &CacheKey) -> PathBuf {
        self.directory
            .join(format!("{}.{}", key.as_str(), ENTRY_EXTENSION))
    }

    fn temp_path(&self, key: &CacheKey) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.directory
            .join(format!("{}.{}.{}.tmp", key.as_str(), std::process::id(), n))
    }

    fn shrink_cached_size(&self, bytes: u64) {
        self.cached_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |size| {
                Some(size.saturating_sub(bytes))
            })
            .ok();
    }

    /// Size of the committed entry at `path`, if any.
    async fn entry_len(path: &Path) -> Option<u64> {
        tokio::fs::metadata(path).await.ok().map(|m| m.len())
    }

    /// Whether a committed entry is present and fresh.
    ///
    /// Expired entries are deleted on sight.
    async fn is_live(&self, path: &Path) -> Result<bool, CacheError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(CacheError::Io(e)),
        };

        if let Some(max_age) = self.max_age {
            let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if Self::is_expired(mtime, SystemTime::now(), max_age) {
                debug!(path = %path.display(), "Disk cache entry expired");
                if tokio::fs::remove_file(path).await.is_ok() {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    self.shrink_cached_size(metadata.len());
                }
                return Ok(false);
            }
        }

        Ok(true)
    }
}

impl PersistentCache for DiskCache {
    fn exists<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, Result<bool, CacheError>> {
        let path = self.key_path(key);
        Box::pin(async move {
            let live = self.is_live(&path).await?;
            if !live {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
            Ok(live)
        })
    }

    fn read<'a>(
        &'a self,
        key: &'a CacheKey,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>> {
        let path = self.key_path(key);
        Box::pin(async move {
            if !self.is_live(&path).await? {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }

            match tokio::fs::read(&path).await {
                Ok(data) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(data))
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    Ok(None)
                }
                Err(e) => Err(CacheError::Io(e)),
            }
        })
    }

    fn write<'a>(
        &'a self,
        key: &'a CacheKey,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        let path = self.key_path(key);
        let temp_path = self.temp_path(key);
        Box::pin(async move {
            let size = data.len() as u64;

            let replaced = Self::entry_len(&path).await;

            // Write atomically via temp file
            let result = async {
                tokio::fs::write(&temp_path, &data).await?;
                tokio::fs::rename(&temp_path, &path).await
            }
            .await;

            match result {
                Ok(()) => {
                    self.writes.fetch_add(1, Ordering::Relaxed);
                    self.cached_size.fetch_add(size, Ordering::Relaxed);
                    if let Some(old) = replaced {
                        self.shrink_cached_size(old);
                    }
                    Ok(())
                }
                Err(e) => {
                    self.write_failures.fetch_add(1, Ordering::Relaxed);
                    let _ = tokio::fs::remove_file(&temp_path).await;
                    Err(CacheError::Io(e))
                }
            }
        })
    }

    fn remove<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, Result<bool, CacheError>> {
        let path = self.key_path(key);
        Box::pin(async move {
            let len = Self::entry_len(&path).await;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    self.shrink_cached_size(len.unwrap_or(0));
                    Ok(true)
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(CacheError::Io(e)),
            }
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), CacheError>> {
        let directory = self.directory.clone();
        Box::pin(async move {
            let removed = tokio::task::spawn_blocking(move || -> Result<usize, std::io::Error> {
                let entries = match std::fs::read_dir(&directory) {
                    Ok(entries) => entries,
                    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
                    Err(e) => return Err(e),
                };

                let mut removed = 0;
                for entry in entries.flatten() {
                    let path = entry.path();
                    if !Self::is_entry_file(&path) {
                        continue;
                    }
                    match std::fs::remove_file(&path) {
                        Ok(()) => removed += 1,
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(removed)
            })
            .await
            .map_err(|e| CacheError::SpawnError(e.to_string()))??;

            self.cached_size.store(0, Ordering::Relaxed);
            info!(removed, "Disk cache cleared");
            Ok(())
        })
    }

    fn stats(&self) -> DiskCacheStats {
        DiskCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size_bytes: self.cached_size.load(Ordering::Relaxed),
        }
    }
}

impl Drop for DiskCache {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
