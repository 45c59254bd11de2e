//! Gallery Cache
//!
//! Offline-tolerant client-side cache for an image gallery backend: categories,
//! images and per-image annotations are served from the last good server snapshot
//! merged with a durable journal of local edits.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;

pub use cache::{CollectionCache, CollectionScope, GalleryCache, Invalidation};
pub use config::Config;
pub use errors::{CacheError, ErrorDetails};

#[cfg(test)]
mod test_support;
