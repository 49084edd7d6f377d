//! Request resolution across the cache tiers.
//!
//! ```text
//! Request → Memory tier → Persistent tier → FetchCoordinator → Fetcher
//!              hit ▲          hit ▲                 │
//!                  │              │                 ▼
//!                  └── success ◄──┴──── persist, decode, warm memory
//! ```
//!
//! The pipeline itself is stateless; cross-request state lives in the
//! [`FetchCoordinator`] registry and the cache tiers.
//!
//! # Key Components
//!
//! - [`Pipeline`] - Resolves one [`RequestContext`] in a given [`LoadMode`]
//! - [`FetchCoordinator`] - Coalesces concurrent misses for the same key
//! - [`RequestContext`] - Source, key, and lifecycle callbacks for a request

mod coalesce;
mod context;

pub use coalesce::{CoalescerStats, FetchCoordinator, FetchHandle};
pub use context::{
    Callbacks, DownloadStartedCallback, ErrorCallback, FinishCallback, RequestContext,
    SuccessCallback,
};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{MemoryCache, PersistentCache};
use crate::decode::{Artifact, Decoder};
use crate::error::ImageError;
use crate::key::CacheKey;
use crate::provider::Fetcher;
use crate::source::{LoadingResult, SourceDescriptor};

/// How far a request goes and what it hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// Resolve and return the decoded artifact
    Full,
    /// Persist the raw bytes without decoding; no success notification
    DownloadOnly,
    /// Warm both tiers; success fires but no artifact is returned
    Preload,
}

/// What a shared fetch hands every attached request.
#[derive(Clone)]
pub enum FetchOutput {
    /// Fetched, persisted, decoded, and placed in the memory tier
    Decoded(Artifact),
    /// Fetched and persisted only. Started by a download-only request, so
    /// joiners that need an artifact decode these bytes themselves.
    Raw(Arc<[u8]>),
}

/// How a request was satisfied before callbacks fire.
enum Outcome {
    Loaded(Artifact, LoadingResult),
    /// Download-only request whose bytes are persisted, now or earlier
    Persisted,
}

/// Coordinates the memory tier, persistent tier, and shared fetches.
pub struct Pipeline {
    memory: Arc<MemoryCache>,
    disk: Arc<dyn PersistentCache>,
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn Decoder>,
    coordinator: Arc<FetchCoordinator<FetchOutput>>,
}

impl Pipeline {
    pub fn new(
        memory: Arc<MemoryCache>,
        disk: Arc<dyn PersistentCache>,
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<dyn Decoder>,
    ) -> Self {
        Self {
            memory,
            disk,
            fetcher,
            decoder,
            coordinator: Arc::new(FetchCoordinator::new()),
        }
    }

    pub fn memory(&self) -> &Arc<MemoryCache> {
        &self.memory
    }

    pub fn disk(&self) -> &Arc<dyn PersistentCache> {
        &self.disk
    }

    pub fn coordinator(&self) -> &Arc<FetchCoordinator<FetchOutput>> {
        &self.coordinator
    }

    /// Resolve one request.
    ///
    /// Fires the context's callbacks (success or error, then finish) and
    /// returns the artifact for [`LoadMode::Full`], `None` otherwise. If the
    /// request's cancellation token fires first, the request detaches from
    /// any shared fetch and fails with [`ImageError::Cancelled`].
    pub async fn resolve(
        &self,
        mut context: RequestContext,
        mode: LoadMode,
    ) -> Result<Option<Artifact>, ImageError> {
        let cancellation = context.cancellation.clone();
        let canonical = context.source.canonical();

        let outcome = match cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(source = %canonical, "Request cancelled");
                        Err(ImageError::Cancelled(canonical))
                    }
                    outcome = self.run(&mut context, mode) => outcome,
                }
            }
            None => self.run(&mut context, mode).await,
        };

        match outcome {
            Ok(Outcome::Loaded(artifact, tier)) => {
                let returned = match mode {
                    LoadMode::Full => Some(artifact.clone()),
                    LoadMode::DownloadOnly | LoadMode::Preload => None,
                };
                context.resolve_success(Some((artifact, tier)));
                Ok(returned)
            }
            Ok(Outcome::Persisted) => {
                context.resolve_success(None);
                Ok(None)
            }
            Err(e) => {
                debug!(
                    source = %context.source,
                    kind = e.kind(),
                    error = %e,
                    "Request failed"
                );
                context.resolve_error(&e);
                Err(e)
            }
        }
    }

    async fn run(&self, context: &mut RequestContext, mode: LoadMode) -> Result<Outcome, ImageError> {
        if mode == LoadMode::DownloadOnly {
            return self.download(context).await;
        }

        let key = context.key.clone();
        let source = context.source.clone();

        if let Some(artifact) = self.memory.get(&key) {
            debug!(key = %key, "Memory cache hit");
            return Ok(Outcome::Loaded(artifact, LoadingResult::MemoryCache));
        }

        if source.is_remote() {
            if let Some(artifact) = self.load_persisted(&key, &source).await {
                self.memory.put(key, artifact.clone());
                return Ok(Outcome::Loaded(artifact, LoadingResult::DiskCache));
            }
        }

        let output = self.fetch_shared(context, true).await?;
        let artifact = match output {
            FetchOutput::Decoded(artifact) => artifact,
            FetchOutput::Raw(data) => {
                debug!(key = %key, "Joined a download-only fetch, decoding locally");
                let artifact =
                    decode_blocking(Arc::clone(&self.decoder), data.to_vec(), source.clone())
                        .await?;
                self.memory.put(key, artifact.clone());
                artifact
            }
        };
        Ok(Outcome::Loaded(artifact, source.origin()))
    }

    /// Persist the source's raw bytes without decoding them.
    async fn download(&self, context: &mut RequestContext) -> Result<Outcome, ImageError> {
        let key = context.key.clone();
        let source = context.source.clone();

        if self.already_present(&key, &source).await {
            debug!(key = %key, source = %source, "Already persisted, nothing to download");
            return Ok(Outcome::Persisted);
        }

        match self.fetch_shared(context, false).await {
            Ok(_) => Ok(Outcome::Persisted),
            // A joined full load wrote the bytes before its decode failed
            Err(e @ ImageError::Decode { .. }) if source.is_remote() => {
                if self.persisted(&key).await {
                    debug!(key = %key, "Bytes persisted despite decode failure");
                    Ok(Outcome::Persisted)
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a download-only request has nothing to do.
    async fn already_present(&self, key: &CacheKey, source: &SourceDescriptor) -> bool {
        if source.is_remote() {
            self.persisted(key).await
        } else {
            self.memory.contains(key)
        }
    }

    async fn persisted(&self, key: &CacheKey) -> bool {
        match self.disk.exists(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(key = %key, error = %e, "Persistent cache lookup failed, treating as miss");
                false
            }
        }
    }

    /// Read and decode a persisted entry. Any fault degrades to a miss.
    async fn load_persisted(&self, key: &CacheKey, source: &SourceDescriptor) -> Option<Artifact> {
        if !self.persisted(key).await {
            return None;
        }

        let data = match self.disk.read(key).await {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Persistent cache read failed, treating as miss");
                return None;
            }
        };

        match decode_blocking(Arc::clone(&self.decoder), data, source.clone()).await {
            Ok(artifact) => {
                debug!(key = %key, "Persistent cache hit");
                Some(artifact)
            }
            Err(e) => {
                warn!(
                    key = %key,
                    error = %e,
                    "Persisted bytes failed to decode, removing entry"
                );
                if let Err(e) = self.disk.remove(key).await {
                    warn!(key = %key, error = %e, "Failed to remove corrupt entry");
                }
                None
            }
        }
    }

    /// Start or join the shared fetch for the context's key.
    ///
    /// A fetch started here writes remote bytes to the persistent tier, then
    /// decodes them into the memory tier when `decode` is set.
    async fn fetch_shared(
        &self,
        context: &mut RequestContext,
        decode: bool,
    ) -> Result<FetchOutput, ImageError> {
        let key = context.key.clone();
        let source = context.source.clone();
        let download_started = context.take_download_started();

        let memory = Arc::clone(&self.memory);
        let disk = Arc::clone(&self.disk);
        let fetcher = Arc::clone(&self.fetcher);
        let decoder = Arc::clone(&self.decoder);
        let fetch_key = key.clone();

        let handle = self.coordinator.acquire_or_join(key, move || async move {
            info!(source = %source, decode, "Fetching from origin");
            if let Some(callback) = download_started {
                callback(&source);
            }

            let data = fetcher.fetch(&source).await?;

            if source.is_remote() {
                if let Err(e) = disk.write(&fetch_key, data.clone()).await {
                    warn!(
                        key = %fetch_key,
                        error = %e,
                        "Failed to persist fetched bytes, continuing"
                    );
                }
            }

            if !decode {
                return Ok(FetchOutput::Raw(Arc::from(data)));
            }

            let artifact = decode_blocking(decoder, data, source.clone()).await?;
            memory.put(fetch_key, artifact.clone());
            Ok(FetchOutput::Decoded(artifact))
        });

        handle.await
    }
}

/// Decode on the blocking pool.
async fn decode_blocking(
    decoder: Arc<dyn Decoder>,
    data: Vec<u8>,
    source: SourceDescriptor,
) -> Result<Artifact, ImageError> {
    let decoded = tokio::task::spawn_blocking(move || decoder.decode(&data, &source))
        .await
        .map_err(|e| ImageError::Internal(format!("decode task failed: {}", e)))?;

    Ok(Arc::new(decoded?))
}
