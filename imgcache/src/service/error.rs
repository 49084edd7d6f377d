//! Service construction errors.

use thiserror::Error;

use crate::cache::CacheError;

/// Errors that can occur while building or registering a service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Failed to start a cache tier
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to create HTTP client
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// A process-wide default service was already registered
    #[error("Default image service is already initialized")]
    AlreadyInitialized,
}
