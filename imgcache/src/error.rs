//! Request-level error taxonomy.
//!
//! `ImageError` is what lifecycle callbacks and request futures see. It is
//! `Clone + PartialEq` because a single fetch failure is delivered verbatim
//! to every request attached to that fetch.

use thiserror::Error;

use crate::cache::CacheError;

/// Errors that can terminate an image request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// Transport failure while fetching from the network
    #[error("Network error fetching {descriptor}: {message}")]
    Network { descriptor: String, message: String },

    /// Storage fault in a cache tier or while reading a local source
    #[error("I/O error: {0}")]
    Io(String),

    /// Payload could not be decoded into an image
    #[error("Failed to decode {descriptor}: {message}")]
    Decode { descriptor: String, message: String },

    /// The source does not exist at its origin (missing file, unknown resource)
    #[error("Source not found: {0}")]
    NotFound(String),

    /// The caller cancelled the request before it resolved
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// The fetch task ended without producing a result
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImageError {
    /// Creates a network error for the given descriptor.
    pub fn network(descriptor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            descriptor: descriptor.into(),
            message: message.into(),
        }
    }

    /// Creates a decode error for the given descriptor.
    pub fn decode(descriptor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            descriptor: descriptor.into(),
            message: message.into(),
        }
    }

    /// Short name of the error kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Io(_) => "io",
            Self::Decode { .. } => "decode",
            Self::NotFound(_) => "not_found",
            Self::Cancelled(_) => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<CacheError> for ImageError {
    fn from(e: CacheError) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<std::io::Error> for ImageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
