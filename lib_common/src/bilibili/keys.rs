//! # WBI Key Cache
//!
//! Holds the current mixin key and refreshes it from the nav endpoint at most
//! once per validity window.
//!
//! ## States:
//! - **Stale**: no keys yet, or keys older than the validity window.
//! - **Fresh**: keys younger than the window; served from a shared read lock.
//!
//! ## Refresh protocol:
//! 1. Optimistic check under the shared lock. Fresh keys return immediately.
//! 2. Otherwise take the refresh gate (an async mutex) and check again. A
//!    caller that waited behind another's refresh finds fresh keys here and
//!    returns without a second network call. This re-check is required for
//!    correctness, not just speed.
//! 3. Still stale: fetch the nav document with no state lock held, then take
//!    the write lock only to store the result.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::wbi;
use crate::error::{Result, ViewerError};
use crate::retrieve::HttpFetcher;

/// The endpoint publishing the two WBI tokens.
pub const NAV_URL: &str = "https://api.bilibili.com/x/web-interface/nav";

/// How long fetched keys are trusted.
pub const KEY_VALIDITY: Duration = Duration::from_secs(3600);

/// One set of key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WbiKeys {
    /// Token from `img_url`.
    pub img_key: String,
    /// Token from `sub_url`.
    pub sub_key: String,
    /// The derived 32-byte signing key.
    pub mixin_key: String,
}

#[derive(Debug, Deserialize)]
struct NavResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    data: Option<NavData>,
}

#[derive(Debug, Deserialize)]
struct NavData {
    #[serde(default)]
    wbi_img: Option<WbiImg>,
}

#[derive(Debug, Default, Deserialize)]
struct WbiImg {
    #[serde(default)]
    img_url: String,
    #[serde(default)]
    sub_url: String,
}

#[derive(Debug, Clone)]
struct CachedKeys {
    keys: WbiKeys,
    fetched_at: Instant,
}

/// Lazily refreshed WBI key material.
pub struct WbiKeyCache {
    http: HttpFetcher,
    nav_url: String,
    validity: Duration,
    state: RwLock<Option<CachedKeys>>,
    refresh_gate: Mutex<()>,
}

impl WbiKeyCache {
    /// Creates an empty (stale) cache.
    pub fn new(http: HttpFetcher, nav_url: impl Into<String>, validity: Duration) -> Self {
        Self {
            http,
            nav_url: nav_url.into(),
            validity,
            state: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    fn fresh(&self, state: &Option<CachedKeys>) -> Option<WbiKeys> {
        state
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.validity)
            .map(|c| c.keys.clone())
    }

    /// Returns fresh keys, fetching them when stale.
    ///
    /// # Errors
    /// [`ViewerError::Signing`] when the nav endpoint is unreachable, returns
    /// non-200, or lacks usable tokens. The cache stays stale, so the next
    /// call tries again.
    pub async fn keys(&self) -> Result<WbiKeys> {
        if let Some(keys) = self.fresh(&*self.state.read().await) {
            return Ok(keys);
        }

        let _gate = self.refresh_gate.lock().await;
        if let Some(keys) = self.fresh(&*self.state.read().await) {
            debug!("WBI keys refreshed by a concurrent caller");
            return Ok(keys);
        }

        let keys = self.fetch_keys().await?;
        *self.state.write().await = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }

    /// Whether the cache currently holds fresh keys.
    pub async fn is_fresh(&self) -> bool {
        self.fresh(&*self.state.read().await).is_some()
    }

    async fn fetch_keys(&self) -> Result<WbiKeys> {
        let response = self
            .http
            .get(&self.nav_url, None)
            .await
            .map_err(|e| ViewerError::Signing(format!("nav request failed: {e}")))?;

        if !response.is_ok() {
            warn!(status = response.status, "Nav endpoint returned non-200");
            return Err(ViewerError::Signing(format!("nav api status: {}", response.status)));
        }

        let nav: NavResponse = serde_json::from_slice(&response.body)
            .map_err(|e| ViewerError::Signing(format!("nav response malformed: {e}")))?;
        let wbi_img = nav.data.and_then(|d| d.wbi_img).unwrap_or_default();

        let (Some(img_key), Some(sub_key)) = (wbi::key_from_url(&wbi_img.img_url), wbi::key_from_url(&wbi_img.sub_url))
        else {
            return Err(ViewerError::Signing("empty wbi urls".to_string()));
        };

        let mixin_key = wbi::mixin_key(img_key, sub_key)?;
        info!(nav_code = nav.code, "Fetched WBI keys");

        Ok(WbiKeys {
            img_key: img_key.to_string(),
            sub_key: sub_key.to_string(),
            mixin_key,
        })
    }
}
