//! Cache key derivation.
//!
//! Keys are the lowercase hex SHA-256 of a descriptor's key material (the URL
//! itself, or a kind-tagged path or resource name).
//! They are stable across processes, which keeps persistent entries
//! addressable after a restart, and are safe to use as file names.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::source::SourceDescriptor;

/// Key addressing both cache tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a source descriptor.
    pub fn derive(source: &SourceDescriptor) -> Self {
        Self::derive_str(&source.key_material())
    }

    /// Derive the key for an arbitrary string (e.g. a custom cache key).
    pub fn derive_str(input: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // FIPS 180-2 test vector
        let key = CacheKey::derive_str("abc");
        assert_eq!(
            key.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_derive_is_deterministic() {
        let source = SourceDescriptor::url("https://example.com/image.png");
        assert_eq!(CacheKey::derive(&source), CacheKey::derive(&source));
    }

    #[test]
    fn test_different_sources_differ() {
        let a = CacheKey::derive(&SourceDescriptor::url("https://example.com/1.png"));
        let b = CacheKey::derive(&SourceDescriptor::url("https://example.com/2.png"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_url_key_matches_url_string() {
        let source = SourceDescriptor::url("https://example.com/a.png");
        assert_eq!(
            CacheKey::derive(&source),
            CacheKey::derive_str("https://example.com/a.png")
        );
    }

    #[test]
    fn test_kinds_with_same_display_form_get_distinct_keys() {
        let embedded = CacheKey::derive(&SourceDescriptor::embedded("logo"));
        let file = CacheKey::derive(&SourceDescriptor::file("embedded://logo"));
        let url = CacheKey::derive(&SourceDescriptor::url("https://x.example/a.png"));
        let url_as_file = CacheKey::derive(&SourceDescriptor::file("https://x.example/a.png"));

        assert_ne!(embedded, file);
        assert_ne!(url, url_as_file);
    }

    #[test]
    fn test_key_is_filename_safe() {
        let key = CacheKey::derive_str("https://example.com/a/b?c=d:e");
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
