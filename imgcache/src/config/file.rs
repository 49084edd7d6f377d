//! Configuration file handling for ~/.imgcache/config.ini.
//!
//! ```ini
//! [cache]
//! directory = ~/.cache/imgcache
//! memory_size = 256MB
//! disk_size = 1GB
//! max_age_days = 30
//!
//! [download]
//! timeout = 30
//!
//! [logging]
//! file = ~/.imgcache/imgcache.log
//! ```

use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;
use super::size::{format_size, parse_size};
use crate::service::ServiceConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFileError {
    fn invalid(section: &str, key: &str, value: &str, reason: &str) -> Self {
        Self::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Persistent cache directory
    pub directory: PathBuf,
    /// Memory tier capacity in bytes
    pub memory_size: usize,
    /// Persistent tier capacity in bytes
    pub disk_size: usize,
    /// Persistent entry lifetime; 0 disables expiry
    pub max_age_days: u32,
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// HTTP timeout in seconds
    pub timeout: u64,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

/// User configuration loaded from an INI file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub download: DownloadSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings {
                directory: default_cache_directory(),
                memory_size: DEFAULT_MEMORY_CACHE_SIZE,
                disk_size: DEFAULT_DISK_CACHE_SIZE,
                max_age_days: DEFAULT_DISK_MAX_AGE_DAYS,
            },
            download: DownloadSettings {
                timeout: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            },
            logging: LoggingSettings {
                file: config_directory().join("imgcache.log"),
            },
        }
    }
}

impl ConfigFile {
    /// Load configuration from the default path (~/.imgcache/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Overlay values found in `ini` onto the defaults.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigFileError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("cache")) {
            if let Some(v) = section.get("directory") {
                let v = v.trim();
                if !v.is_empty() {
                    config.cache.directory = expand_tilde(v);
                }
            }
            if let Some(v) = section.get("memory_size") {
                config.cache.memory_size = parse_size(v).map_err(|_| {
                    ConfigFileError::invalid("cache", "memory_size", v, "expected format like '256MB'")
                })?;
            }
            if let Some(v) = section.get("disk_size") {
                config.cache.disk_size = parse_size(v).map_err(|_| {
                    ConfigFileError::invalid("cache", "disk_size", v, "expected format like '1GB'")
                })?;
            }
            if let Some(v) = section.get("max_age_days") {
                config.cache.max_age_days = v.trim().parse().map_err(|_| {
                    ConfigFileError::invalid(
                        "cache",
                        "max_age_days",
                        v,
                        "must be a non-negative integer (0 disables expiry)",
                    )
                })?;
            }
        }

        if let Some(section) = ini.section(Some("download")) {
            if let Some(v) = section.get("timeout") {
                config.download.timeout = match v.trim().parse::<u64>() {
                    Ok(secs) if secs > 0 => secs,
                    _ => {
                        return Err(ConfigFileError::invalid(
                            "download",
                            "timeout",
                            v,
                            "must be a positive integer (seconds)",
                        ))
                    }
                };
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(v) = section.get("file") {
                let v = v.trim();
                if !v.is_empty() {
                    config.logging.file = expand_tilde(v);
                }
            }
        }

        Ok(config)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let mut ini = Ini::new();
        ini.with_section(Some("cache"))
            .set("directory", self.cache.directory.to_string_lossy())
            .set("memory_size", format_size(self.cache.memory_size))
            .set("disk_size", format_size(self.cache.disk_size))
            .set("max_age_days", self.cache.max_age_days.to_string());
        ini.with_section(Some("download"))
            .set("timeout", self.download.timeout.to_string());
        ini.with_section(Some("logging"))
            .set("file", self.logging.file.to_string_lossy());

        ini.write_to_file(path)
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Build the service configuration these settings describe.
    pub fn to_service_config(&self) -> ServiceConfig {
        let max_age = match self.cache.max_age_days {
            0 => None,
            days => Some(Duration::from_secs(u64::from(days) * 24 * 60 * 60)),
        };

        ServiceConfig::default()
            .with_memory_cache_size(self.cache.memory_size)
            .with_disk_cache_directory(self.cache.directory.clone())
            .with_disk_cache_size(self.cache.disk_size as u64)
            .with_disk_max_age(max_age)
            .with_fetch_timeout(Duration::from_secs(self.download.timeout))
    }
}

/// Get the path to the config directory (~/.imgcache).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".imgcache")
}

/// Get the path to the config file (~/.imgcache/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.ini");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert_eq!(config.cache.memory_size, DEFAULT_MEMORY_CACHE_SIZE);
        assert_eq!(config.cache.disk_size, DEFAULT_DISK_CACHE_SIZE);
        assert_eq!(config.cache.max_age_days, 30);
        assert_eq!(config.download.timeout, 30);
        assert!(config.cache.directory.ends_with("imgcache"));
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp_dir.path().join("missing.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_load_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            "[cache]\ndirectory = /var/cache/images\nmemory_size = 64MB\ndisk_size = 2GB\nmax_age_days = 7\n\n[download]\ntimeout = 10\n",
        );

        let config = ConfigFile::load_from(&path).unwrap();

        assert_eq!(config.cache.directory, PathBuf::from("/var/cache/images"));
        assert_eq!(config.cache.memory_size, 64 * 1024 * 1024);
        assert_eq!(config.cache.disk_size, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.cache.max_age_days, 7);
        assert_eq!(config.download.timeout, 10);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, "[download]\ntimeout = 5\n");

        let config = ConfigFile::load_from(&path).unwrap();

        assert_eq!(config.download.timeout, 5);
        assert_eq!(config.cache, ConfigFile::default().cache);
    }

    #[test]
    fn test_invalid_size_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, "[cache]\nmemory_size = plenty\n");

        match ConfigFile::load_from(&path) {
            Err(ConfigFileError::InvalidValue { section, key, .. }) => {
                assert_eq!(section, "cache");
                assert_eq!(key, "memory_size");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, "[download]\ntimeout = 0\n");

        assert!(matches!(
            ConfigFile::load_from(&path),
            Err(ConfigFileError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.cache.directory = temp_dir.path().join("cache");
        config.cache.memory_size = 32 * 1024 * 1024;
        config.cache.max_age_days = 0;
        config.download.timeout = 12;

        config.save_to(&path).unwrap();
        let reloaded = ConfigFile::load_from(&path).unwrap();

        assert_eq!(reloaded.cache, config.cache);
        assert_eq!(reloaded.download, config.download);
    }

    #[test]
    fn test_to_service_config() {
        let mut config = ConfigFile::default();
        config.cache.memory_size = 1024;
        config.cache.disk_size = 4096;
        config.cache.max_age_days = 0;
        config.download.timeout = 3;

        let service = config.to_service_config();

        assert_eq!(service.memory_cache_size, 1024);
        assert_eq!(service.disk.max_size_bytes, 4096);
        assert!(service.disk.max_age.is_none());
        assert_eq!(service.fetch_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/cache"), home.join("cache"));
        }
    }
}
