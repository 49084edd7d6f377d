//! Service builder: assembles the cache tiers, fetcher, and decoder.
//!
//! Any collaborator can be injected; whatever is left unset is created from
//! the [`ServiceConfig`].

use std::sync::Arc;

use tracing::info;

use super::config::ServiceConfig;
use super::error::ServiceError;
use super::facade::ImageService;
use super::invalidation::InvalidationService;
use crate::cache::{DiskCache, MemoryCache, NoOpPersistentCache, PersistentCache};
use crate::decode::{Decoder, ImageDecoder};
use crate::pipeline::Pipeline;
use crate::provider::{EmbeddedResources, Fetcher, HttpFetcher, SourceFetcher};

/// Result of cache initialization.
pub struct CacheComponents {
    pub memory: Arc<MemoryCache>,
    pub persistent: Arc<dyn PersistentCache>,
    /// Set when the default disk tier was started, so it can be shut down
    pub disk: Option<Arc<DiskCache>>,
}

/// Create the memory tier and, if enabled, start the disk tier.
pub async fn create_caches(config: &ServiceConfig) -> Result<CacheComponents, ServiceError> {
    let memory = Arc::new(MemoryCache::new(config.memory_cache_size));

    if !config.disk_cache_enabled {
        info!("Disk cache disabled, running memory-only");
        return Ok(CacheComponents {
            memory,
            persistent: Arc::new(NoOpPersistentCache),
            disk: None,
        });
    }

    let disk = DiskCache::start(config.disk.clone()).await?;
    Ok(CacheComponents {
        memory,
        persistent: disk.clone(),
        disk: Some(disk),
    })
}

/// Create the default fetcher: HTTP for URLs, filesystem for files, and
/// the given registry for embedded resources.
pub fn create_fetcher(
    config: &ServiceConfig,
    embedded: EmbeddedResources,
) -> Result<Arc<dyn Fetcher>, ServiceError> {
    let http = HttpFetcher::with_timeout(config.fetch_timeout)
        .map_err(|e| ServiceError::HttpClient(e.to_string()))?;
    Ok(Arc::new(SourceFetcher::new(Arc::new(http), embedded)))
}

/// Builder for [`ImageService`].
#[derive(Default)]
pub struct ImageServiceBuilder {
    config: ServiceConfig,
    memory: Option<Arc<MemoryCache>>,
    persistent: Option<Arc<dyn PersistentCache>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    decoder: Option<Arc<dyn Decoder>>,
    embedded: Option<EmbeddedResources>,
}

impl ImageServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn memory_cache(mut self, memory: Arc<MemoryCache>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Use `cache` as the persistent tier instead of starting a [`DiskCache`].
    pub fn persistent_cache(mut self, cache: Arc<dyn PersistentCache>) -> Self {
        self.persistent = Some(cache);
        self
    }

    /// Replace the default [`SourceFetcher`]. Embedded resources registered
    /// through [`embedded`](Self::embedded) are then ignored.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Registry consulted for `embedded:` sources by the default fetcher.
    pub fn embedded(mut self, resources: EmbeddedResources) -> Self {
        self.embedded = Some(resources);
        self
    }

    pub async fn build(self) -> Result<ImageService, ServiceError> {
        let config = self.config;

        let memory = match self.memory {
            Some(memory) => memory,
            None => Arc::new(MemoryCache::new(config.memory_cache_size)),
        };

        let (persistent, disk) = match self.persistent {
            Some(persistent) => (persistent, None),
            None => {
                let caches = create_caches(&config).await?;
                (caches.persistent, caches.disk)
            }
        };

        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => create_fetcher(&config, self.embedded.unwrap_or_default())?,
        };

        let decoder: Arc<dyn Decoder> = match self.decoder {
            Some(decoder) => decoder,
            None => Arc::new(ImageDecoder),
        };

        info!(
            memory_cache_size = memory.max_size_bytes(),
            disk_cache = disk.as_ref().map(|d| d.directory().display().to_string()),
            "Image service initialized"
        );

        let invalidation = InvalidationService::new(memory.clone(), persistent.clone());
        let pipeline = Arc::new(Pipeline::new(memory, persistent, fetcher, decoder));

        Ok(ImageService::from_parts(pipeline, invalidation, disk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_caches_memory_only() {
        let config = ServiceConfig::default()
            .with_memory_cache_size(1024)
            .without_disk_cache();

        let caches = create_caches(&config).await.unwrap();

        assert_eq!(caches.memory.max_size_bytes(), 1024);
        assert!(caches.disk.is_none());
    }

    #[tokio::test]
    async fn test_create_caches_starts_disk() {
        let temp_dir = TempDir::new().unwrap();
        let config = ServiceConfig::default()
            .with_disk_cache_directory(temp_dir.path().join("cache"))
            .with_disk_gc_interval(Duration::from_secs(3600));

        let caches = create_caches(&config).await.unwrap();

        let disk = caches.disk.unwrap();
        assert!(disk.directory().is_dir());
        disk.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_disk_size_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = ServiceConfig::default()
            .with_disk_cache_directory(temp_dir.path())
            .with_disk_cache_size(0);

        let result = ImageServiceBuilder::new().config(config).build().await;

        assert!(matches!(result, Err(ServiceError::Cache(_))));
    }

    #[tokio::test]
    async fn test_injected_memory_cache_is_used() {
        let memory = Arc::new(MemoryCache::new(4096));
        let service = ImageServiceBuilder::new()
            .config(ServiceConfig::default().without_disk_cache())
            .memory_cache(memory.clone())
            .build()
            .await
            .unwrap();

        assert!(Arc::ptr_eq(service.memory_cache(), &memory));
        assert!(service.disk_cache_handle().is_none());
    }
}
