//! High-level image loading service.
//!
//! Wires the memory tier, the persistent tier, the fetcher, and the decoder
//! behind one facade. Requests are built fluently and executed in one of
//! three modes.
//!
//! # Example
//!
//! ```ignore
//! use imgcache::cache::CacheType;
//! use imgcache::service::{ImageService, ServiceConfig};
//!
//! let service = ImageService::start(ServiceConfig::default()).await?;
//!
//! // Persist without decoding into a caller-visible artifact
//! service.load_url("https://example.com/a.png").download_only().await?;
//!
//! // Warm both tiers
//! service.load_url("https://example.com/a.png").preload().await?;
//!
//! service.invalidate_cache(CacheType::All).await?;
//! ```

mod builder;
mod config;
mod error;
mod facade;
mod invalidation;
mod request;

pub use builder::{create_caches, create_fetcher, CacheComponents, ImageServiceBuilder};
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use facade::{ImageService, ServiceStats};
pub use invalidation::InvalidationService;
pub use request::LoadRequest;
