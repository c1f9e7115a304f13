//! # TTL Response Cache
//!
//! A generic map from an opaque string key to a cached payload with an
//! optional content type and an absolute expiry instant.
//!
//! ## Behaviour:
//! - **Freshness**: an entry is served only while `now < expires_at`. Expired
//!   entries are reported as [`CacheLookup::Expired`] once and dropped.
//! - **Bounded size**: the map never holds more than `capacity` entries. When
//!   full, inserting a new key evicts the least-recently-used one.
//! - **Clock**: expiry uses `tokio::time::Instant`, so tests can drive it with a
//!   paused runtime clock.
//!
//! Callers decide what is cacheable; this type stores whatever it is given.

use std::num::NonZeroUsize;
use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// A cached payload as handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// The raw body bytes.
    pub payload: Bytes,
    /// The upstream `Content-Type`, when one was recorded.
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: CachedResponse,
    expires_at: Instant,
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Present and within its TTL.
    Fresh(CachedResponse),
    /// Present but past its TTL. The entry has been removed.
    Expired(CachedResponse),
    /// No entry for the key.
    Missing,
}

impl CacheLookup {
    /// Whether an entry existed for the key, fresh or not.
    pub fn found(&self) -> bool {
        !matches!(self, CacheLookup::Missing)
    }

    /// Whether the entry existed but had expired.
    pub fn expired(&self) -> bool {
        matches!(self, CacheLookup::Expired(_))
    }

    /// The payload, only if it is still fresh.
    pub fn into_fresh(self) -> Option<CachedResponse> {
        match self {
            CacheLookup::Fresh(r) => Some(r),
            _ => None,
        }
    }
}

/// A named, bounded TTL cache.
pub struct ResponseCache {
    name: String,
    default_ttl: Duration,
    capacity: NonZeroUsize,
    inner: Mutex<LruCache<String, CacheEntry>>,
}

impl ResponseCache {
    /// Creates a cache holding at most `capacity` entries (a capacity of 0 is
    /// treated as 1).
    pub fn new(name: impl Into<String>, default_ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name: name.into(),
            default_ttl,
            capacity,
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The cache name used in log lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The TTL applied by [`ResponseCache::insert`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Current number of entries, including not-yet-collected expired ones.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up `key`, promoting it in the LRU order when fresh.
    pub fn get(&self, key: &str) -> CacheLookup {
        let now = Instant::now();
        let mut guard = self.inner.lock();

        let Some(expires_at) = guard.peek(key).map(|entry| entry.expires_at) else {
            return CacheLookup::Missing;
        };

        if now < expires_at {
            guard
                .get(key)
                .map(|entry| CacheLookup::Fresh(entry.response.clone()))
                .unwrap_or(CacheLookup::Missing)
        } else {
            guard
                .pop(key)
                .map(|entry| CacheLookup::Expired(entry.response))
                .unwrap_or(CacheLookup::Missing)
        }
    }

    /// Stores `payload` under `key` for `ttl`, replacing any previous entry.
    pub fn put(&self, key: impl Into<String>, payload: Bytes, content_type: Option<String>, ttl: Duration) {
        let key = key.into();
        let entry = CacheEntry {
            response: CachedResponse { payload, content_type },
            expires_at: Instant::now() + ttl,
        };

        let mut guard = self.inner.lock();
        if let Some((evicted, _)) = guard.push(key.clone(), entry) {
            if evicted != key {
                debug!(cache = %self.name, evicted = %evicted, "Evicted least-recently-used entry");
            }
        }
    }

    /// Stores `payload` with the cache's default TTL.
    pub fn insert(&self, key: impl Into<String>, payload: Bytes, content_type: Option<String>) {
        self.put(key, payload, content_type, self.default_ttl);
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let stale: Vec<String> = guard
            .iter()
            .filter(|(_, entry)| now >= entry.expires_at)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            guard.pop(key);
        }
        stale.len()
    }
}
