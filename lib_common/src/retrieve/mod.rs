//! # Data Retrieval Module
//!
//! This module provides a centralized location for generic data retrieval
//! clients and utilities, primarily focused on HTTP-based interactions.
//!
//! ## Purpose:
//! Every outbound call the backend makes (master-data feeds, the WBI nav
//! endpoint, the signed dynamic-feed proxy and the image proxy) goes through the
//! same `HttpFetcher`, so timeouts, the shared cookie store and the raw-bytes
//! response shape are handled in one place.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: A cloneable `HttpFetcher` built on `reqwest`, returning
//!   `RawResponse` values (status, headers, body bytes) instead of decoded JSON
//!   so callers decide whether and how to parse.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Generic HTTP fetcher with per-request timeouts and a shared cookie store.
pub mod ky_http;

#[cfg(test)]
pub(crate) mod mock_server;

pub use ky_http::{HttpFetcher, RawResponse, BROWSER_USER_AGENT};
