//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`load`] - Load requests (get, preload, download, key)
//! - [`cache`] - Cache management (invalidate, stats, gc)

pub mod cache;
pub mod load;
