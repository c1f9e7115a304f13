//! # Response Cache Module
//!
//! Bounded, TTL-keyed byte-blob caches used by the proxy endpoints. The
//! server builds two independent instances at startup (signed-API responses
//! and images) and hands them to the handlers through shared state.
//!
//! ## Contained Modules:
//!
//! - **`response_cache`**: `ResponseCache`, an LRU-bounded map from opaque
//!   string keys to `{payload, content type, expiry}` entries.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The TTL + LRU response cache.
pub mod response_cache;

pub use response_cache::{CacheLookup, CachedResponse, ResponseCache};
