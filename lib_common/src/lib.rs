//! # lib_common
//!
//! Shared building blocks for the Snowy Viewer backend. Every module besides
//! `error` sits behind a cargo feature of the same name so binaries only pull in
//! the dependency stack they actually use (`full` enables everything).
//!
//! ## Contained Modules:
//!
//! - **`error`**: The crate-wide `ViewerError` taxonomy and `Result` alias.
//! - **`retrieve`**: The shared async `HttpFetcher` used for every outbound call.
//! - **`cache`**: The bounded TTL `ResponseCache` behind the proxy endpoints.
//! - **`masterdata`**: Feed models, the local-first `FeedFetcher`, immutable
//!   `Generation`s of derived lookup maps and the `MasterStore` that swaps them.
//! - **`bilibili`**: WBI request signing, the signing `WbiKeyCache` and the
//!   dynamic-feed / image proxy client.
//! - **`ingestors`**: The self-scheduling master-data refresh poller and the
//!   response-cache sweeper.

#![doc(html_logo_url = "https://example.com/logo.png")] // Placeholder
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Error taxonomy shared by every module.
pub mod error;

/// Shared HTTP fetcher.
#[cfg(feature = "retrieve")]
pub mod retrieve;

/// TTL-keyed response cache.
#[cfg(feature = "cache")]
pub mod cache;

/// Master data aggregation.
#[cfg(feature = "masterdata")]
pub mod masterdata;

/// Bilibili signing and proxy client.
#[cfg(feature = "bilibili")]
pub mod bilibili;

/// Background pollers.
#[cfg(feature = "ingestors")]
pub mod ingestors;

pub use error::{Result, ViewerError};
