//! HTTP(S) fetcher backed by an async reqwest client.

use std::time::Duration;

use tracing::{debug, trace, warn};

use super::types::Fetcher;
use crate::cache::BoxFuture;
use crate::config::{DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::error::ImageError;
use crate::source::SourceDescriptor;

/// Fetches URL sources over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the default timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS))
    }

    /// Creates a fetcher with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        Ok(Self { client })
    }

    /// GET `url` and return the body.
    pub async fn get(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        trace!(url, "HTTP GET request starting");

        let response = match self.client.get(url).send().await {
            Ok(resp) => {
                debug!(url, status = resp.status().as_u16(), "HTTP response received");
                resp
            }
            Err(e) => {
                warn!(
                    url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(ImageError::network(url, format!("request failed: {}", e)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "HTTP error status");
            return Err(ImageError::network(url, format!("HTTP {}", status)));
        }

        match response.bytes().await {
            Ok(bytes) => {
                trace!(url, bytes = bytes.len(), "HTTP response body read");
                Ok(bytes.to_vec())
            }
            Err(e) => {
                warn!(url, error = %e, "Failed to read response body");
                Err(ImageError::network(url, format!("failed to read response: {}", e)))
            }
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        source: &'a SourceDescriptor,
    ) -> BoxFuture<'a, Result<Vec<u8>, ImageError>> {
        Box::pin(async move {
            match source {
                SourceDescriptor::Url(url) => self.get(url).await,
                other => Err(ImageError::Internal(format!(
                    "HTTP fetcher cannot load non-URL source {}",
                    other
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_fetcher() {
        assert!(HttpFetcher::new().is_ok());
        assert!(HttpFetcher::with_timeout(Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn test_rejects_non_url_source() {
        let fetcher = HttpFetcher::new().unwrap();
        let source = SourceDescriptor::file("/tmp/a.png");

        let err = fetcher.fetch(&source).await.unwrap_err();
        assert_eq!(err.kind(), "internal");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(2)).unwrap();
        // Port 9 on localhost (discard) is almost never listening
        let source = SourceDescriptor::url("http://127.0.0.1:9/missing.png");

        let err = fetcher.fetch(&source).await.unwrap_err();
        assert_eq!(err.kind(), "network");
    }
}
