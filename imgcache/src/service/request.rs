//! Per-request builder returned by the `ImageService::load*` methods.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::decode::Artifact;
use crate::error::ImageError;
use crate::key::CacheKey;
use crate::pipeline::{Callbacks, LoadMode, Pipeline, RequestContext};
use crate::source::{LoadingResult, SourceDescriptor};

/// A pending load of one source.
///
/// Attach callbacks and options, then execute with [`preload`](Self::preload),
/// [`download_only`](Self::download_only), or
/// [`get_artifact`](Self::get_artifact). Executing consumes the request, so
/// each callback fires at most once and `on_finish` exactly once.
pub struct LoadRequest {
    pipeline: Arc<Pipeline>,
    source: SourceDescriptor,
    custom_key: Option<String>,
    callbacks: Callbacks,
    cancellation: Option<CancellationToken>,
}

impl LoadRequest {
    pub(crate) fn new(pipeline: Arc<Pipeline>, source: SourceDescriptor) -> Self {
        Self {
            pipeline,
            source,
            custom_key: None,
            callbacks: Callbacks::default(),
            cancellation: None,
        }
    }

    /// Called by the request that starts the origin fetch. Requests that
    /// join a fetch already in flight do not see it.
    pub fn on_download_started<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&SourceDescriptor) + Send + 'static,
    {
        self.callbacks.download_started = Some(Box::new(callback));
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Artifact, LoadingResult) + Send + 'static,
    {
        self.callbacks.success = Some(Box::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&ImageError) + Send + 'static,
    {
        self.callbacks.error = Some(Box::new(callback));
        self
    }

    pub fn on_finish<F>(mut self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.callbacks.finish = Some(Box::new(callback));
        self
    }

    /// Key both tiers by `key` instead of the source's canonical form.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.custom_key = Some(key.into());
        self
    }

    /// Abort this request (not the shared fetch) when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    /// The key this request will use.
    pub fn key(&self) -> CacheKey {
        match &self.custom_key {
            Some(custom) => CacheKey::derive_str(custom),
            None => CacheKey::derive(&self.source),
        }
    }

    /// Warm both tiers. `on_success` fires; no artifact is returned.
    pub async fn preload(self) -> Result<(), ImageError> {
        self.execute(LoadMode::Preload).await.map(|_| ())
    }

    /// Persist the raw bytes without decoding them. `on_success` never fires.
    pub async fn download_only(self) -> Result<(), ImageError> {
        self.execute(LoadMode::DownloadOnly).await.map(|_| ())
    }

    /// Resolve and return the decoded image.
    pub async fn get_artifact(self) -> Result<Artifact, ImageError> {
        let source = self.source.canonical();
        self.execute(LoadMode::Full).await?.ok_or_else(|| {
            ImageError::Internal(format!("no artifact produced for {}", source))
        })
    }

    async fn execute(self, mode: LoadMode) -> Result<Option<Artifact>, ImageError> {
        let key = self.key();
        let context = RequestContext {
            source: self.source,
            key,
            callbacks: self.callbacks,
            cancellation: self.cancellation,
        };
        self.pipeline.resolve(context, mode).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, NoOpPersistentCache};
    use crate::decode::ImageDecoder;
    use crate::provider::{EmbeddedResources, HttpFetcher, SourceFetcher};

    fn pipeline() -> Arc<Pipeline> {
        let fetcher = SourceFetcher::new(
            Arc::new(HttpFetcher::new().unwrap()),
            EmbeddedResources::new(),
        );
        Arc::new(Pipeline::new(
            Arc::new(MemoryCache::new(1_000_000)),
            Arc::new(NoOpPersistentCache),
            Arc::new(fetcher),
            Arc::new(ImageDecoder),
        ))
    }

    #[test]
    fn test_default_key_follows_source() {
        let source = SourceDescriptor::url("https://example.com/a.png");
        let request = LoadRequest::new(pipeline(), source.clone());
        assert_eq!(request.key(), CacheKey::derive(&source));
    }

    #[test]
    fn test_custom_key_overrides_source() {
        let a = LoadRequest::new(pipeline(), SourceDescriptor::url("https://a.example/x.png"))
            .with_cache_key("shared");
        let b = LoadRequest::new(pipeline(), SourceDescriptor::file("/tmp/x.png"))
            .with_cache_key("shared");

        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), CacheKey::derive_str("shared"));
    }

    #[tokio::test]
    async fn test_missing_embedded_resource_reports_not_found() {
        let (tx, rx) = tokio::sync::oneshot::channel();

        let result = LoadRequest::new(pipeline(), SourceDescriptor::embedded("missing"))
            .on_error(move |e| {
                let _ = tx.send(e.clone());
            })
            .get_artifact()
            .await;

        let reported = rx.await.ok();
        assert!(matches!(result, Err(ImageError::NotFound(_))));
        assert_eq!(reported, result.err());
    }
}
