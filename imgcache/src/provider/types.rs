//! Fetcher trait.

use crate::cache::BoxFuture;
use crate::error::ImageError;
use crate::source::SourceDescriptor;

/// Retrieves raw image bytes from a source's origin.
///
/// Implementations report a missing source as [`ImageError::NotFound`] and
/// transport failures as [`ImageError::Network`].
pub trait Fetcher: Send + Sync {
    /// Fetch the raw bytes for `source`.
    fn fetch<'a>(&'a self, source: &'a SourceDescriptor)
        -> BoxFuture<'a, Result<Vec<u8>, ImageError>>;
}
