//! # Bilibili Proxy Client
//!
//! Fetches a user's dynamic feed through the signed web API and proxies
//! hot-link-protected images, caching successful responses.
//!
//! ## Behaviour:
//! - **Dynamic feed**: signed with WBI, sent with browser-like headers and
//!   optional session credentials. Cached under `dynamic_{uid}` only when the
//!   upstream answers 200 with JSON `code == 0`.
//! - **Images**: fetched with a bilibili `Referer`, cached by URL together
//!   with their `Content-Type` when the upstream answers 200.
//! - **Credentials**: a full cookie string, when given, replaces the
//!   `SESSDATA` token. Cookies collected by the warm-up call are appended to
//!   either, so the signed request carries both.
//! - Everything else passes through uncached with the upstream status.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, ORIGIN, REFERER, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::keys::{WbiKeyCache, KEY_VALIDITY, NAV_URL};
use super::wbi::{self, WbiParams};
use crate::cache::{CacheLookup, ResponseCache};
use crate::error::{Result, ViewerError};
use crate::retrieve::{HttpFetcher, RawResponse, BROWSER_USER_AGENT};

/// Space dynamic feed endpoint.
pub const DYNAMIC_FEED_URL: &str = "https://api.bilibili.com/x/polymer/web-dynamic/v1/feed/space";
/// Page fetched once at startup to collect session cookies.
pub const WARM_UP_URL: &str = "https://www.bilibili.com/";
/// Timeout for the warm-up request.
pub const WARM_UP_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for proxied API and image requests.
pub const PROXY_TIMEOUT: Duration = Duration::from_secs(60);

/// Fixed `dm_img_str` fingerprint.
pub const DM_IMG_STR: &str = "V2ViR0wgMS4wIChPcGVuR0wgRVMgMi4wIENocm9taXVtKQ";
/// Fixed `dm_cover_img_str` fingerprint.
pub const DM_COVER_IMG_STR: &str = "QU5HTEUgKEFNRCwgQU1EIFJhZGVvbiA3ODBNIEdyYXBoaWNzICgweDAwMDAxNUJGKSBEaXJlY3QzRDExIHZzXzVfMCBwc181XzAsIEQzRDExKUdvb2dsZSBJbmMuIChBTU";
/// Feature flags that make the feed include opus text.
pub const DYNAMIC_FEATURES: &str = "itemOpusStyle,listOnlyfans,opusBigCover,onlyfansVote,forwardListHidden,decorationCard,commentsNewVersion,onlyfansAssetsV2,ugcDelete,onlyfansQaCard,avatarAutoTheme,sunflowerStyle,cardsEnhance,eva3CardOpus,eva3CardVideo,eva3CardComment,eva3CardUser";

const IMAGE_REFERER: &str = "https://www.bilibili.com/";
const SPACE_ORIGIN: &str = "https://space.bilibili.com";

/// Upstream URLs, overridable for mirrors and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BilibiliEndpoints {
    /// Dynamic feed endpoint (without query).
    pub dynamic_feed_url: String,
    /// Nav endpoint for WBI keys.
    pub nav_url: String,
    /// Warm-up page.
    pub warm_up_url: String,
}

impl Default for BilibiliEndpoints {
    fn default() -> Self {
        Self {
            dynamic_feed_url: DYNAMIC_FEED_URL.to_string(),
            nav_url: NAV_URL.to_string(),
            warm_up_url: WARM_UP_URL.to_string(),
        }
    }
}

/// Optional session credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Raw `SESSDATA` token.
    pub sessdata: Option<String>,
    /// A complete `Cookie` header value. Wins over `sessdata`.
    pub cookie: Option<String>,
}

impl Credentials {
    /// The credential part of the `Cookie` header. A full cookie string
    /// replaces `SESSDATA`.
    fn cookie_value(&self) -> Option<String> {
        let cookie = self.cookie.as_deref().filter(|s| !s.is_empty());
        match cookie {
            Some(c) if HeaderValue::from_str(c).is_ok() => return Some(c.to_string()),
            Some(_) => warn!("Ignoring cookie header with invalid characters"),
            None => {}
        }

        let token = self.sessdata.as_deref().filter(|s| !s.is_empty())?;
        let value = format!("SESSDATA={token}");
        if HeaderValue::from_str(&value).is_err() {
            warn!("Ignoring SESSDATA with invalid characters");
            return None;
        }
        Some(value)
    }

    /// Sets the `Cookie` header to the credentials followed by the cookies the
    /// client has collected (`stored`). Without credentials the header is left
    /// alone and the client attaches stored cookies itself.
    fn apply(&self, headers: &mut HeaderMap, stored: Option<String>) {
        let Some(credential) = self.cookie_value() else {
            return;
        };
        let merged = match stored.filter(|s| !s.is_empty()) {
            Some(stored) => format!("{credential}; {stored}"),
            None => credential,
        };
        match HeaderValue::from_str(&merged) {
            Ok(v) => {
                headers.insert(COOKIE, v);
            }
            Err(e) => warn!(error = %e, "Ignoring cookie header with invalid characters"),
        }
    }
}

/// Settings for [`BilibiliClient::new`].
pub struct BilibiliOptions {
    /// Shared outbound fetcher; its cookie store carries warm-up cookies.
    pub http: HttpFetcher,
    /// Upstream URLs.
    pub endpoints: BilibiliEndpoints,
    /// Session credentials.
    pub credentials: Credentials,
    /// WBI key validity window.
    pub key_validity: Duration,
    /// Cache for signed API responses.
    pub api_cache: Arc<ResponseCache>,
    /// Cache for images.
    pub image_cache: Arc<ResponseCache>,
}

impl BilibiliOptions {
    /// Default endpoints and key validity, no credentials.
    pub fn new(http: HttpFetcher, api_cache: Arc<ResponseCache>, image_cache: Arc<ResponseCache>) -> Self {
        Self {
            http,
            endpoints: BilibiliEndpoints::default(),
            credentials: Credentials::default(),
            key_validity: KEY_VALIDITY,
            api_cache,
            image_cache,
        }
    }
}

/// Whether a proxied response came from the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from cache.
    Hit,
    /// Fetched from upstream.
    Miss,
}

impl CacheStatus {
    /// `HIT` or `MISS`, as sent in `X-Cache`.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A response ready to hand back to the HTTP caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxiedResponse {
    /// Status to forward.
    pub status: u16,
    /// Content type to forward, if known.
    pub content_type: Option<String>,
    /// Body to forward.
    pub body: Bytes,
    /// Cache outcome.
    pub cache: CacheStatus,
}

#[derive(Deserialize)]
struct ApiEnvelope {
    code: Option<i64>,
}

/// The proxy client.
pub struct BilibiliClient {
    http: HttpFetcher,
    keys: WbiKeyCache,
    endpoints: BilibiliEndpoints,
    credentials: Credentials,
    api_cache: Arc<ResponseCache>,
    image_cache: Arc<ResponseCache>,
}

impl BilibiliClient {
    /// Builds the client and its key cache.
    pub fn new(options: BilibiliOptions) -> Self {
        let BilibiliOptions {
            http,
            endpoints,
            credentials,
            key_validity,
            api_cache,
            image_cache,
        } = options;

        Self {
            keys: WbiKeyCache::new(http.clone(), endpoints.nav_url.clone(), key_validity),
            http,
            endpoints,
            credentials,
            api_cache,
            image_cache,
        }
    }

    /// The WBI key cache.
    pub fn keys(&self) -> &WbiKeyCache {
        &self.keys
    }

    /// The signed-API response cache.
    pub fn api_cache(&self) -> &Arc<ResponseCache> {
        &self.api_cache
    }

    /// The image cache.
    pub fn image_cache(&self) -> &Arc<ResponseCache> {
        &self.image_cache
    }

    /// Requests the homepage once so the cookie store holds anonymous session
    /// cookies. Failures are logged and otherwise ignored.
    pub async fn warm_up(&self) {
        match self.http.get_with_timeout(&self.endpoints.warm_up_url, None, WARM_UP_TIMEOUT).await {
            Ok(resp) => info!(status = resp.status, "Bilibili cookie warm-up finished"),
            Err(e) => warn!(error = %e, "Bilibili cookie warm-up failed"),
        }
    }

    /// Runs [`BilibiliClient::warm_up`] on a background task.
    pub fn spawn_warm_up(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move { client.warm_up().await })
    }

    /// The fixed query parameters for a space feed request, before signing.
    pub fn dynamic_params(uid: &str) -> WbiParams {
        [
            ("host_mid", uid),
            ("platform", "web"),
            ("web_location", "0.0"),
            ("dm_img_list", "[]"),
            ("dm_img_str", DM_IMG_STR),
            ("dm_cover_img_str", DM_COVER_IMG_STR),
            ("features", DYNAMIC_FEATURES),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Fetches the dynamic feed of `uid`, from cache when fresh.
    ///
    /// # Errors
    /// * [`ViewerError::BadRequest`] for an empty or non-numeric uid.
    /// * [`ViewerError::Signing`] when WBI keys cannot be obtained.
    /// * [`ViewerError::Fetch`] when the upstream request fails outright.
    pub async fn dynamic_feed(&self, uid: &str) -> Result<ProxiedResponse> {
        if uid.is_empty() {
            return Err(ViewerError::BadRequest("Empty UID".to_string()));
        }
        if !uid.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ViewerError::BadRequest(format!("Invalid UID: {uid}")));
        }

        let cache_key = format!("dynamic_{uid}");
        if let CacheLookup::Fresh(hit) = self.api_cache.get(&cache_key) {
            debug!(uid, "Dynamic feed cache hit");
            return Ok(ProxiedResponse {
                status: 200,
                content_type: hit.content_type.or_else(|| Some("application/json".to_string())),
                body: hit.payload,
                cache: CacheStatus::Hit,
            });
        }

        let keys = self.keys.keys().await?;
        let signed = wbi::sign(&Self::dynamic_params(uid), &keys.mixin_key);
        let url = format!("{}?{}", self.endpoints.dynamic_feed_url, signed);

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{SPACE_ORIGIN}/{uid}/dynamic"))
                .map_err(|e| ViewerError::BadRequest(e.to_string()))?,
        );
        headers.insert(ORIGIN, HeaderValue::from_static(SPACE_ORIGIN));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"));
        self.credentials.apply(&mut headers, self.http.cookies_for(&url));

        let resp = self.http.get_with_timeout(&url, Some(headers), PROXY_TIMEOUT).await?;

        if is_cacheable_api_response(&resp) {
            self.api_cache.insert(cache_key, resp.body.clone(), Some("application/json".to_string()));
        } else {
            warn!(uid, status = resp.status, "Dynamic feed not cached");
        }

        Ok(ProxiedResponse {
            status: resp.status,
            content_type: Some("application/json".to_string()),
            body: resp.body,
            cache: CacheStatus::Miss,
        })
    }

    /// Fetches an image by absolute URL, from cache when fresh.
    ///
    /// # Errors
    /// * [`ViewerError::BadRequest`] for an empty or invalid URL.
    /// * [`ViewerError::Fetch`] when the upstream request fails outright.
    pub async fn image(&self, url: &str) -> Result<ProxiedResponse> {
        if url.is_empty() {
            return Err(ViewerError::BadRequest("Missing url parameter".to_string()));
        }

        if let CacheLookup::Fresh(hit) = self.image_cache.get(url) {
            return Ok(ProxiedResponse {
                status: 200,
                content_type: hit.content_type,
                body: hit.payload,
                cache: CacheStatus::Hit,
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(REFERER, HeaderValue::from_static(IMAGE_REFERER));

        let resp = self.http.get_with_timeout(url, Some(headers), PROXY_TIMEOUT).await?;
        let content_type = resp.content_type().map(str::to_string);

        if resp.is_ok() {
            self.image_cache.insert(url, resp.body.clone(), content_type.clone());
        }

        Ok(ProxiedResponse {
            status: resp.status,
            content_type,
            body: resp.body,
            cache: CacheStatus::Miss,
        })
    }
}

fn is_cacheable_api_response(resp: &RawResponse) -> bool {
    resp.is_ok()
        && serde_json::from_slice::<ApiEnvelope>(&resp.body)
            .map(|envelope| envelope.code == Some(0))
            .unwrap_or(false)
}
