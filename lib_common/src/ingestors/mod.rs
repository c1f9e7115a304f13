//! # Data Ingestors Module
//!
//! Long-running background tasks that keep in-memory state in sync with
//! upstream sources.
//!
//! ## Contained Modules:
//! - **`masterdata_polling`**: A self-scheduling poller that refreshes the
//!   `MasterStore` once at startup and then on a fixed interval until shutdown.
//! - **`cache_sweeping`**: A timer that purges expired entries from the
//!   response caches.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The periodic master-data refresher.
pub mod masterdata_polling;

/// The periodic cache purge.
pub mod cache_sweeping;

pub use cache_sweeping::CacheSweeper;
pub use masterdata_polling::{MasterDataPoller, DEFAULT_REFRESH_INTERVAL};
