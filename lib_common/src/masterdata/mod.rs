//! # Master Data Module
//!
//! Aggregates the independently versioned game master-data feeds (events,
//! cards, music, virtual lives, gachas, costumes) into cross-referenced lookup
//! maps held in memory.
//!
//! ## Data flow:
//! `FeedFetcher` (local snapshot or remote) → `Generation::build` (joins) →
//! `MasterStore` (atomic swap) → readers via snapshot getters.
//!
//! ## Contained Modules:
//!
//! - **`models`**: Serde shapes for raw feed rows and map projections.
//! - **`feeds`**: The `FeedCatalog` of endpoints and the local-first `FeedFetcher`.
//! - **`generation`**: `Generation`, one immutable bundle of derived maps.
//! - **`store`**: `MasterStore`, which owns and refreshes the live generation.
//! - **`gacha_query`**: Gacha list search/sort/pagination and detail lookup.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Raw feed records and projections.
pub mod models;
/// Feed endpoints and the local-first fetcher.
pub mod feeds;
/// Immutable derived-map bundles.
pub mod generation;
/// The aggregation store.
pub mod store;
/// Gacha list and detail queries.
pub mod gacha_query;

pub use feeds::{FeedCatalog, FeedFetcher, FeedSource, FeedSpec, FEED_TIMEOUT};
pub use gacha_query::{gacha_detail, list_gachas, GachaDetail, GachaListQuery, GachaListResponse};
pub use generation::{FeedSet, Generation, GenerationCounts, GenerationStats};
pub use store::MasterStore;
