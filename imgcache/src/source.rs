//! Source descriptors and result provenance.

use std::fmt;
use std::path::{Path, PathBuf};

/// Prefix used for the canonical form of embedded resources.
pub const EMBEDDED_SCHEME: &str = "embedded://";

/// Identifies where an image comes from.
///
/// Cache keys are derived from [`SourceDescriptor::key_material`], which tags
/// local and embedded sources with their kind. Two descriptors address the
/// same cache entry exactly when they are equal, even if their display forms
/// coincide (a file literally named `embedded://logo`, say).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceDescriptor {
    /// Remote resource fetched over HTTP(S)
    Url(String),
    /// File on the local filesystem
    File(PathBuf),
    /// Named resource registered with the service at startup
    Embedded(String),
}

impl SourceDescriptor {
    /// Creates a URL descriptor.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Creates a local file descriptor.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Creates an embedded resource descriptor.
    pub fn embedded(name: impl Into<String>) -> Self {
        Self::Embedded(name.into())
    }

    /// Interprets a user-supplied string.
    ///
    /// `http://` and `https://` become URLs, `embedded://name` becomes an
    /// embedded resource, anything else is a file path.
    pub fn parse(input: &str) -> Self {
        let lower = input.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(input.to_string())
        } else if let Some(name) = input.strip_prefix(EMBEDDED_SCHEME) {
            Self::Embedded(name.to_string())
        } else {
            Self::File(PathBuf::from(input))
        }
    }

    /// Canonical string form used for key derivation and logging.
    pub fn canonical(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::File(path) => path.to_string_lossy().into_owned(),
            Self::Embedded(name) => format!("{}{}", EMBEDDED_SCHEME, name),
        }
    }

    /// Input to key derivation.
    ///
    /// URLs hash as themselves so keys can be recomputed from the URL alone.
    /// Other kinds carry a NUL-separated tag, which no valid URL contains.
    pub fn key_material(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::File(path) => format!("file\0{}", path.to_string_lossy()),
            Self::Embedded(name) => format!("embedded\0{}", name),
        }
    }

    /// Whether this source is fetched over the network.
    ///
    /// Only remote sources are written to the persistent tier.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    /// The provenance reported when this source is loaded from its origin.
    pub fn origin(&self) -> LoadingResult {
        match self {
            Self::Url(_) => LoadingResult::Internet,
            Self::File(_) => LoadingResult::LocalFile,
            Self::Embedded(_) => LoadingResult::Embedded,
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl From<&str> for SourceDescriptor {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for SourceDescriptor {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&Path> for SourceDescriptor {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<PathBuf> for SourceDescriptor {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

/// Which tier or origin satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingResult {
    /// Decoded image was already in memory
    MemoryCache,
    /// Raw bytes came from the persistent tier
    DiskCache,
    /// Fetched over the network
    Internet,
    /// Read from the local filesystem
    LocalFile,
    /// Read from an embedded resource
    Embedded,
}

impl LoadingResult {
    /// Whether the request was satisfied without touching the origin.
    pub fn is_cache_hit(self) -> bool {
        matches!(self, Self::MemoryCache | Self::DiskCache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url() {
        let source = SourceDescriptor::parse("https://example.com/a.png");
        assert_eq!(source, SourceDescriptor::url("https://example.com/a.png"));
        assert!(source.is_remote());
        assert_eq!(source.origin(), LoadingResult::Internet);
    }

    #[test]
    fn test_parse_url_is_case_insensitive_on_scheme() {
        let source = SourceDescriptor::parse("HTTP://EXAMPLE.COM/A.PNG");
        assert!(source.is_remote());
        // The original spelling is preserved for the key
        assert_eq!(source.canonical(), "HTTP://EXAMPLE.COM/A.PNG");
    }

    #[test]
    fn test_parse_embedded() {
        let source = SourceDescriptor::parse("embedded://logo.png");
        assert_eq!(source, SourceDescriptor::embedded("logo.png"));
        assert_eq!(source.canonical(), "embedded://logo.png");
        assert!(!source.is_remote());
    }

    #[test]
    fn test_parse_file() {
        let source = SourceDescriptor::parse("/tmp/photo.jpg");
        assert_eq!(source, SourceDescriptor::file("/tmp/photo.jpg"));
        assert_eq!(source.origin(), LoadingResult::LocalFile);
    }

    #[test]
    fn test_display_matches_canonical() {
        let source = SourceDescriptor::embedded("icon");
        assert_eq!(source.to_string(), source.canonical());
    }

    #[test]
    fn test_key_material_distinguishes_kinds() {
        let file = SourceDescriptor::file("embedded://logo");
        let embedded = SourceDescriptor::embedded("logo");
        assert_eq!(file.canonical(), embedded.canonical());
        assert_ne!(file.key_material(), embedded.key_material());

        let file = SourceDescriptor::file("https://example.com/a.png");
        let url = SourceDescriptor::url("https://example.com/a.png");
        assert_ne!(file.key_material(), url.key_material());
        assert_eq!(url.key_material(), "https://example.com/a.png");
    }

    #[test]
    fn test_cache_hit_classification() {
        assert!(LoadingResult::MemoryCache.is_cache_hit());
        assert!(LoadingResult::DiskCache.is_cache_hit());
        assert!(!LoadingResult::Internet.is_cache_hit());
        assert!(!LoadingResult::LocalFile.is_cache_hit());
    }
}
