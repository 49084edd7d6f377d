//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization, and service creation
//! to reduce duplication across command handlers.

use std::path::{Path, PathBuf};

use imgcache::config::ConfigFile;
use imgcache::logging::{init_logging, LoggingGuard};
use imgcache::service::ImageService;
use tracing::info;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Keeps the log writer alive while the runner exists
    _logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Load config (defaults if the file is absent) and start logging.
    ///
    /// Log events go to the configured file; `verbose` mirrors them to stdout.
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let log_path = &config.logging.file;
        let log_dir = log_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let log_file = log_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| imgcache::logging::default_log_file().to_string());

        let logging_guard = init_logging(&log_dir, &log_file, verbose)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!(version = imgcache::VERSION, command, "imgcache CLI starting");
    }

    /// Start a service from the loaded configuration.
    pub async fn create_service(&self) -> Result<ImageService, CliError> {
        let service = ImageService::start(self.config.to_service_config()).await?;
        info!(
            directory = %self.config.cache.directory.display(),
            "Service created successfully"
        );
        Ok(service)
    }
}
