//! imgcache - Deduplicating two-tier image fetch cache
//!
//! This library loads images from remote URLs, local files, or embedded
//! resources and keeps them in two cache tiers: a bounded in-process memory
//! cache of decoded images and a persistent disk cache of raw bytes.
//! Concurrent requests for the same image share a single in-flight fetch.
//!
//! # High-Level API
//!
//! The [`service`] module provides the facade most callers need:
//!
//! ```ignore
//! use imgcache::service::{ImageService, ServiceConfig};
//! use imgcache::cache::CacheType;
//!
//! let service = ImageService::start(ServiceConfig::default()).await?;
//!
//! // Fetch once, populate both tiers, fire callbacks
//! service
//!     .load_url("https://example.com/photo.jpg")
//!     .on_success(|image, from| println!("{}x{} from {:?}", image.width(), image.height(), from))
//!     .preload()
//!     .await?;
//!
//! service.invalidate_cache(CacheType::All).await?;
//! ```

pub mod cache;
pub mod config;
pub mod decode;
pub mod error;
pub mod key;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod service;
pub mod source;

pub use error::ImageError;
pub use key::CacheKey;
pub use source::{LoadingResult, SourceDescriptor};

/// Version of the imgcache library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
