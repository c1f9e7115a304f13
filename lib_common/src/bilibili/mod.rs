//! # Bilibili Module
//!
//! Everything needed to talk to bilibili's web APIs on behalf of the viewer
//! frontend, which cannot call them directly because of CORS, request signing
//! and hot-link protection.
//!
//! ## Contained Modules:
//!
//! - **`wbi`**: Pure WBI signing (mixin key derivation, canonical query
//!   encoding, `w_rid`).
//! - **`keys`**: `WbiKeyCache`, the lazily refreshed signing key with
//!   collapsed concurrent refreshes.
//! - **`client`**: `BilibiliClient`, the dynamic-feed and image proxy with
//!   response caching, session credentials and cookie warm-up.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// WBI signing primitives.
pub mod wbi;
/// WBI key cache.
pub mod keys;
/// Dynamic feed and image proxy client.
pub mod client;

pub use client::{
    BilibiliClient, BilibiliEndpoints, BilibiliOptions, CacheStatus, Credentials, ProxiedResponse,
};
pub use keys::{WbiKeyCache, WbiKeys, KEY_VALIDITY, NAV_URL};
pub use wbi::{sign, sign_at, WbiParams};
