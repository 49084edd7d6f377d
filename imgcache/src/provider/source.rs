//! Fetcher that dispatches on the kind of source.

use std::io::ErrorKind;
use std::sync::Arc;

use tracing::debug;

use super::embedded::EmbeddedResources;
use super::types::Fetcher;
use crate::cache::BoxFuture;
use crate::error::ImageError;
use crate::source::SourceDescriptor;

/// Default fetcher: URLs go to the network fetcher, files are read from disk,
/// embedded names are looked up in the resource registry.
pub struct SourceFetcher {
    network: Arc<dyn Fetcher>,
    embedded: EmbeddedResources,
}

impl SourceFetcher {
    pub fn new(network: Arc<dyn Fetcher>, embedded: EmbeddedResources) -> Self {
        Self { network, embedded }
    }

    /// Registry backing `embedded://` sources.
    pub fn embedded(&self) -> &EmbeddedResources {
        &self.embedded
    }
}

impl Fetcher for SourceFetcher {
    fn fetch<'a>(
        &'a self,
        source: &'a SourceDescriptor,
    ) -> BoxFuture<'a, Result<Vec<u8>, ImageError>> {
        Box::pin(async move {
            match source {
                SourceDescriptor::Url(_) => self.network.fetch(source).await,
                SourceDescriptor::File(path) => match tokio::fs::read(path).await {
                    Ok(data) => {
                        debug!(path = %path.display(), bytes = data.len(), "Read local image");
                        Ok(data)
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        Err(ImageError::NotFound(source.canonical()))
                    }
                    Err(e) => Err(ImageError::Io(format!("{}: {}", path.display(), e))),
                },
                SourceDescriptor::Embedded(name) => self
                    .embedded
                    .get(name)
                    .map(|data| data.to_vec())
                    .ok_or_else(|| ImageError::NotFound(source.canonical())),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StaticFetcher {
        calls: AtomicUsize,
    }

    impl Fetcher for StaticFetcher {
        fn fetch<'a>(
            &'a self,
            _source: &'a SourceDescriptor,
        ) -> BoxFuture<'a, Result<Vec<u8>, ImageError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(vec![7, 7, 7]) })
        }
    }

    fn fetcher() -> (Arc<StaticFetcher>, SourceFetcher) {
        let network = Arc::new(StaticFetcher {
            calls: AtomicUsize::new(0),
        });
        let embedded = EmbeddedResources::new().with("logo", vec![1u8, 2]);
        let source_fetcher = SourceFetcher::new(network.clone(), embedded);
        (network, source_fetcher)
    }

    #[tokio::test]
    async fn test_url_goes_to_network() {
        let (network, fetcher) = fetcher();
        let data = fetcher
            .fetch(&SourceDescriptor::url("https://example.com/a.png"))
            .await
            .unwrap();

        assert_eq!(data, vec![7, 7, 7]);
        assert_eq!(network.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_file_is_read_from_disk() {
        let (network, fetcher) = fetcher();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.png");
        std::fs::write(&path, [4u8, 5, 6]).unwrap();

        let data = fetcher.fetch(&SourceDescriptor::file(&path)).await.unwrap();

        assert_eq!(data, vec![4, 5, 6]);
        assert_eq!(network.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (_network, fetcher) = fetcher();
        let source = SourceDescriptor::file("/definitely/not/here.png");

        let err = fetcher.fetch(&source).await.unwrap_err();
        assert_eq!(err, ImageError::NotFound(source.canonical()));
    }

    #[tokio::test]
    async fn test_embedded_lookup() {
        let (_network, fetcher) = fetcher();

        let data = fetcher
            .fetch(&SourceDescriptor::embedded("logo"))
            .await
            .unwrap();
        assert_eq!(data, vec![1, 2]);

        let err = fetcher
            .fetch(&SourceDescriptor::embedded("unknown"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
