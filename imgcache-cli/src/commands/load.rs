//! Load commands: fetch images through the service's cache tiers.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::future::join_all;
use imgcache::decode::Artifact;
use imgcache::service::{ImageService, LoadRequest};
use imgcache::{CacheKey, SourceDescriptor};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the get command.
pub struct GetArgs {
    pub source: String,
    pub cache_key: Option<String>,
    pub output: Option<PathBuf>,
}

/// Request with progress output attached.
fn request(service: &ImageService, source: &str, cache_key: Option<&str>) -> LoadRequest {
    let label = source.to_string();
    let request = service
        .load(SourceDescriptor::parse(source))
        .on_download_started(|source| println!("Downloading {}", source))
        .on_error(move |e| eprintln!("  {}: {}", label, e));

    match cache_key {
        Some(key) => request.with_cache_key(key),
        None => request,
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling requests");
            token.cancel();
        }
    });
}

/// Run the get command: resolve one image and optionally save it as PNG.
pub async fn get(runner: &CliRunner, args: GetArgs) -> Result<(), CliError> {
    let service = runner.create_service().await?;
    let token = CancellationToken::new();
    cancel_on_interrupt(token.clone());

    let start = Instant::now();
    let artifact = request(&service, &args.source, args.cache_key.as_deref())
        .on_success(|_, tier| println!("Loaded from {:?}", tier))
        .with_cancellation(token)
        .get_artifact()
        .await?;

    println!(
        "  {}x{} ({} bytes decoded) in {:.2}s",
        artifact.width(),
        artifact.height(),
        artifact.byte_size(),
        start.elapsed().as_secs_f64()
    );

    if let Some(path) = args.output {
        save_png(&path, &artifact)?;
        println!("Saved to {}", path.display());
    }

    service.shutdown().await;
    Ok(())
}

/// Run the preload command: warm both tiers for every source concurrently.
pub async fn preload(runner: &CliRunner, sources: Vec<String>) -> Result<(), CliError> {
    let service = runner.create_service().await?;
    let total = sources.len();

    let requests = sources.iter().map(|source| {
        let label = source.clone();
        request(&service, source, None)
            .on_success(move |_, tier| println!("Preloaded {} ({:?})", label, tier))
            .preload()
    });
    let failed = join_all(requests)
        .await
        .into_iter()
        .filter(Result::is_err)
        .count();

    info!(total, failed, "Preload finished");
    service.shutdown().await;
    batch_result(failed, total)
}

/// Run the download command: persist raw bytes without keeping artifacts.
pub async fn download(runner: &CliRunner, sources: Vec<String>) -> Result<(), CliError> {
    let service = runner.create_service().await?;
    let total = sources.len();

    let requests = sources.iter().map(|source| {
        let label = source.clone();
        request(&service, source, None)
            .on_finish(move || println!("Done {}", label))
            .download_only()
    });
    let failed = join_all(requests)
        .await
        .into_iter()
        .filter(Result::is_err)
        .count();

    info!(total, failed, "Download finished");
    service.shutdown().await;
    batch_result(failed, total)
}

/// Run the key command: print the cache key a source maps to.
pub fn key(source: &str, cache_key: Option<&str>) {
    let key = match cache_key {
        Some(custom) => CacheKey::derive_str(custom),
        None => CacheKey::derive(&SourceDescriptor::parse(source)),
    };
    println!("{}", key);
}

fn batch_result(failed: usize, total: usize) -> Result<(), CliError> {
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::Partial { failed, total })
    }
}

fn save_png(path: &Path, artifact: &Artifact) -> Result<(), CliError> {
    let file_error = |error: String| CliError::FileWrite {
        path: path.display().to_string(),
        error,
    };

    let buffer = image::RgbaImage::from_raw(
        artifact.width(),
        artifact.height(),
        artifact.pixels().to_vec(),
    )
    .ok_or_else(|| file_error("pixel buffer does not match dimensions".to_string()))?;

    buffer
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| file_error(e.to_string()))
}
