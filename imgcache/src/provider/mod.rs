//! Fetchers that retrieve raw image bytes from a source's origin.

mod embedded;
mod http;
mod source;
mod types;

pub use embedded::EmbeddedResources;
pub use http::HttpFetcher;
pub use source::SourceFetcher;
pub use types::Fetcher;
