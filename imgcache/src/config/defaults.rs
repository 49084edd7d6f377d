//! Default values for service and config-file settings.

/// Memory tier capacity in decoded bytes (256 MB).
pub const DEFAULT_MEMORY_CACHE_SIZE: usize = 256 * 1024 * 1024;

/// Persistent tier capacity in bytes (1 GB).
pub const DEFAULT_DISK_CACHE_SIZE: usize = 1024 * 1024 * 1024;

/// Persistent entries older than this are collected.
pub const DEFAULT_DISK_MAX_AGE_DAYS: u32 = 30;

/// Seconds between persistent tier GC cycles.
pub const DEFAULT_DISK_GC_INTERVAL_SECS: u64 = 60;

/// HTTP request timeout in seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// User agent sent by the HTTP fetcher.
pub const DEFAULT_USER_AGENT: &str = concat!("imgcache/", env!("CARGO_PKG_VERSION"));

/// Name of the directory under the platform cache dir.
pub const CACHE_DIR_NAME: &str = "imgcache";

/// Default persistent cache directory (`<platform cache dir>/imgcache`).
pub fn default_cache_directory() -> std::path::PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(CACHE_DIR_NAME)
}
