//! Image service facade.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::info;

use super::builder::ImageServiceBuilder;
use super::config::ServiceConfig;
use super::error::ServiceError;
use super::invalidation::InvalidationService;
use super::request::LoadRequest;
use crate::cache::{CacheStats, CacheType, DiskCache, MemoryCache, PersistentCache};
use crate::error::ImageError;
use crate::key::CacheKey;
use crate::pipeline::{CoalescerStats, Pipeline};
use crate::source::SourceDescriptor;

/// Process-wide default, set at most once.
static DEFAULT_SERVICE: OnceLock<ImageService> = OnceLock::new();

/// Snapshot of cache and coalescing counters.
#[derive(Debug, Clone, Default)]
pub struct ServiceStats {
    pub cache: CacheStats,
    pub coalescer: CoalescerStats,
}

/// Entry point for loading images through the two cache tiers.
///
/// Cheap to clone; clones share caches and the in-flight fetch registry.
///
/// # Example
///
/// ```ignore
/// use imgcache::service::{ImageService, ServiceConfig};
///
/// let service = ImageService::start(ServiceConfig::default()).await?;
///
/// let image = service
///     .load_url("https://example.com/logo.png")
///     .on_download_started(|source| println!("downloading {}", source))
///     .get_artifact()
///     .await?;
/// ```
#[derive(Clone)]
pub struct ImageService {
    pipeline: Arc<Pipeline>,
    invalidation: InvalidationService,
    disk: Option<Arc<DiskCache>>,
}

impl ImageService {
    /// Build a service with default collaborators from `config`.
    pub async fn start(config: ServiceConfig) -> Result<Self, ServiceError> {
        ImageServiceBuilder::new().config(config).build().await
    }

    pub fn builder() -> ImageServiceBuilder {
        ImageServiceBuilder::new()
    }

    pub(crate) fn from_parts(
        pipeline: Arc<Pipeline>,
        invalidation: InvalidationService,
        disk: Option<Arc<DiskCache>>,
    ) -> Self {
        Self {
            pipeline,
            invalidation,
            disk,
        }
    }

    /// Register `service` as the process-wide default.
    pub fn init_default(service: ImageService) -> Result<(), ServiceError> {
        DEFAULT_SERVICE
            .set(service)
            .map_err(|_| ServiceError::AlreadyInitialized)
    }

    /// The process-wide default, if one was registered.
    pub fn default_instance() -> Option<&'static ImageService> {
        DEFAULT_SERVICE.get()
    }

    pub fn load(&self, source: impl Into<SourceDescriptor>) -> LoadRequest {
        LoadRequest::new(Arc::clone(&self.pipeline), source.into())
    }

    pub fn load_url(&self, url: impl Into<String>) -> LoadRequest {
        self.load(SourceDescriptor::url(url))
    }

    pub fn load_file(&self, path: impl Into<PathBuf>) -> LoadRequest {
        self.load(SourceDescriptor::file(path))
    }

    pub fn load_embedded(&self, name: impl Into<String>) -> LoadRequest {
        self.load(SourceDescriptor::embedded(name))
    }

    /// Clear the tiers selected by `scope`.
    pub async fn invalidate_cache(&self, scope: CacheType) -> Result<(), ImageError> {
        self.invalidation.invalidate(scope).await
    }

    /// Remove one source's entry from the tiers selected by `scope`.
    ///
    /// With `wait_for_completion` false, the persistent removal runs in the
    /// background.
    pub async fn invalidate_cache_entry(
        &self,
        source: &SourceDescriptor,
        scope: CacheType,
        wait_for_completion: bool,
    ) -> Result<(), ImageError> {
        self.invalidate_cache_key(&self.cache_key(source), scope, wait_for_completion)
            .await
    }

    /// Remove the entry stored under `key` from the tiers selected by `scope`.
    ///
    /// Entries loaded with [`LoadRequest::with_cache_key`] are reachable only
    /// this way; see [`ImageService::custom_cache_key`].
    pub async fn invalidate_cache_key(
        &self,
        key: &CacheKey,
        scope: CacheType,
        wait_for_completion: bool,
    ) -> Result<(), ImageError> {
        self.invalidation
            .invalidate_entry(key, scope, wait_for_completion)
            .await
    }

    /// The key a plain request for `source` uses.
    pub fn cache_key(&self, source: &SourceDescriptor) -> CacheKey {
        CacheKey::derive(source)
    }

    /// The key a request made with `with_cache_key(custom)` uses.
    pub fn custom_cache_key(&self, custom: &str) -> CacheKey {
        CacheKey::derive_str(custom)
    }

    pub fn memory_cache(&self) -> &Arc<MemoryCache> {
        self.pipeline.memory()
    }

    pub fn disk_cache(&self) -> &Arc<dyn PersistentCache> {
        self.pipeline.disk()
    }

    /// The disk tier, when the service started its own.
    pub fn disk_cache_handle(&self) -> Option<&Arc<DiskCache>> {
        self.disk.as_ref()
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            cache: CacheStats {
                memory: self.pipeline.memory().stats(),
                disk: self.pipeline.disk().stats(),
            },
            coalescer: self.pipeline.coordinator().stats(),
        }
    }

    /// Stop background maintenance. Loads still work afterwards.
    pub async fn shutdown(&self) {
        if let Some(disk) = &self.disk {
            disk.shutdown().await;
        }
        info!("Image service shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EmbeddedResources;
    use crate::source::LoadingResult;

    fn png_bytes() -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    async fn memory_only_service() -> ImageService {
        ImageService::builder()
            .config(ServiceConfig::default().without_disk_cache())
            .embedded(EmbeddedResources::new().with("logo", png_bytes()))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_embedded_then_memory_hit() {
        let service = memory_only_service().await;

        let (tx, rx) = tokio::sync::oneshot::channel();
        let image = service
            .load_embedded("logo")
            .on_success(move |_, tier| {
                let _ = tx.send(tier);
            })
            .get_artifact()
            .await
            .unwrap();
        assert_eq!((image.width(), image.height()), (2, 2));
        assert_eq!(rx.await.unwrap(), LoadingResult::Embedded);

        let (tx, rx) = tokio::sync::oneshot::channel();
        service
            .load_embedded("logo")
            .on_success(move |_, tier| {
                let _ = tx.send(tier);
            })
            .preload()
            .await
            .unwrap();
        assert_eq!(rx.await.unwrap(), LoadingResult::MemoryCache);
    }

    #[tokio::test]
    async fn test_cache_key_matches_derivation() {
        let service = memory_only_service().await;
        let source = SourceDescriptor::url("https://example.com/a.png");

        assert_eq!(service.cache_key(&source), CacheKey::derive(&source));
    }

    #[tokio::test]
    async fn test_invalidate_custom_key_entry() {
        let service = memory_only_service().await;
        service
            .load_embedded("logo")
            .with_cache_key("brand")
            .preload()
            .await
            .unwrap();
        service.load_embedded("logo").preload().await.unwrap();

        let custom = service.custom_cache_key("brand");
        let plain = service.cache_key(&SourceDescriptor::embedded("logo"));
        assert!(service.memory_cache().contains(&custom));

        service
            .invalidate_cache_key(&custom, CacheType::All, true)
            .await
            .unwrap();

        assert!(!service.memory_cache().contains(&custom));
        assert!(service.memory_cache().contains(&plain));
    }

    #[tokio::test]
    async fn test_stats_track_requests() {
        let service = memory_only_service().await;

        service.load_embedded("logo").preload().await.unwrap();
        service.load_embedded("logo").preload().await.unwrap();

        let stats = service.stats();
        assert_eq!(stats.coalescer.total_requests, 1);
        assert_eq!(stats.cache.memory.hits, 1);
        assert_eq!(stats.cache.memory.entry_count, 1);
    }

    #[tokio::test]
    async fn test_clones_share_caches() {
        let service = memory_only_service().await;
        let clone = service.clone();

        service.load_embedded("logo").preload().await.unwrap();

        let key = clone.cache_key(&SourceDescriptor::embedded("logo"));
        assert!(clone.memory_cache().contains(&key));
    }

    #[tokio::test]
    async fn test_default_instance_set_once() {
        let first = memory_only_service().await;
        let second = memory_only_service().await;

        // Other tests in this binary never register a default
        assert!(ImageService::init_default(first).is_ok());
        assert!(ImageService::default_instance().is_some());
        assert!(matches!(
            ImageService::init_default(second),
            Err(ServiceError::AlreadyInitialized)
        ));
    }
}
