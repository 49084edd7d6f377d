//! Per-request context: the source, its key, and lifecycle callbacks.

use tokio_util::sync::CancellationToken;

use crate::decode::Artifact;
use crate::error::ImageError;
use crate::key::CacheKey;
use crate::source::{LoadingResult, SourceDescriptor};

/// Fired once by the request that initiates a network/origin fetch.
pub type DownloadStartedCallback = Box<dyn FnOnce(&SourceDescriptor) + Send>;

/// Fired with the artifact and the tier that satisfied the request.
pub type SuccessCallback = Box<dyn FnOnce(Artifact, LoadingResult) + Send>;

/// Fired with the error that terminated the request.
pub type ErrorCallback = Box<dyn FnOnce(&ImageError) + Send>;

/// Fired exactly once after success or error.
pub type FinishCallback = Box<dyn FnOnce() + Send>;

/// Optional lifecycle callbacks for one request.
#[derive(Default)]
pub struct Callbacks {
    pub download_started: Option<DownloadStartedCallback>,
    pub success: Option<SuccessCallback>,
    pub error: Option<ErrorCallback>,
    pub finish: Option<FinishCallback>,
}

/// Everything the pipeline needs to resolve one request.
///
/// Consumed by resolution, which guarantees each callback fires at most once
/// and `finish` fires exactly once.
pub struct RequestContext {
    pub source: SourceDescriptor,
    pub key: CacheKey,
    pub callbacks: Callbacks,
    pub cancellation: Option<CancellationToken>,
}

impl RequestContext {
    /// Context keyed by the source's own canonical form, with no callbacks.
    pub fn new(source: SourceDescriptor) -> Self {
        let key = CacheKey::derive(&source);
        Self {
            source,
            key,
            callbacks: Callbacks::default(),
            cancellation: None,
        }
    }

    /// Take the download-started callback, leaving `None`.
    pub(crate) fn take_download_started(&mut self) -> Option<DownloadStartedCallback> {
        self.callbacks.download_started.take()
    }

    /// Fire `success` (if `notify`) then `finish`.
    pub(crate) fn resolve_success(self, artifact: Option<(Artifact, LoadingResult)>) {
        let Callbacks {
            success, finish, ..
        } = self.callbacks;

        if let (Some(callback), Some((artifact, tier))) = (success, artifact) {
            callback(artifact, tier);
        }
        if let Some(callback) = finish {
            callback();
        }
    }

    /// Fire `error` then `finish`.
    pub(crate) fn resolve_error(self, error: &ImageError) {
        let Callbacks { error: on_error, finish, .. } = self.callbacks;

        if let Some(callback) = on_error {
            callback(error);
        }
        if let Some(callback) = finish {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodedImage;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording_context(log: Arc<Mutex<Vec<String>>>) -> RequestContext {
        let mut context = RequestContext::new(SourceDescriptor::url("https://example.com/a.png"));
        let l = log.clone();
        context.callbacks.success = Some(Box::new(move |_, tier| {
            l.lock().push(format!("success:{:?}", tier))
        }));
        let l = log.clone();
        context.callbacks.error = Some(Box::new(move |e| l.lock().push(format!("error:{}", e.kind()))));
        let l = log;
        context.callbacks.finish = Some(Box::new(move || l.lock().push("finish".to_string())));
        context
    }

    #[test]
    fn test_key_derived_from_source() {
        let source = SourceDescriptor::url("https://example.com/a.png");
        let context = RequestContext::new(source.clone());
        assert_eq!(context.key, CacheKey::derive(&source));
    }

    #[test]
    fn test_success_then_finish() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let context = recording_context(log.clone());
        let artifact = Arc::new(DecodedImage::new(1, 1, vec![0; 4]));

        context.resolve_success(Some((artifact, LoadingResult::Internet)));

        assert_eq!(*log.lock(), vec!["success:Internet", "finish"]);
    }

    #[test]
    fn test_finish_without_success_notification() {
        let log = Arc::new(Mutex::new(Vec::new()));
        recording_context(log.clone()).resolve_success(None);

        assert_eq!(*log.lock(), vec!["finish"]);
    }

    #[test]
    fn test_error_then_finish() {
        let log = Arc::new(Mutex::new(Vec::new()));
        recording_context(log.clone())
            .resolve_error(&ImageError::Cancelled("https://example.com/a.png".to_string()));

        assert_eq!(*log.lock(), vec!["error:cancelled", "finish"]);
    }

    #[test]
    fn test_take_download_started_once() {
        let mut context = RequestContext::new(SourceDescriptor::embedded("logo"));
        context.callbacks.download_started = Some(Box::new(|_| {}));

        assert!(context.take_download_started().is_some());
        assert!(context.take_download_started().is_none());
    }
}
