//! # HTTP Retrieval Utilities
//!
//! This module provides an asynchronous fetcher wrapper around `reqwest`.
//! It keeps one connection pool and cookie store for the whole process and
//! hands back raw response bytes together with status and headers.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Url;

use crate::error::{Result, ViewerError};

/// Desktop Chrome user agent sent with every outbound request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A standardized container for raw HTTP responses.
///
/// The body is kept as bytes; callers that need JSON decode it themselves
/// so that non-JSON payloads (images) and pass-through proxying share one path.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
    /// The full response body.
    pub body: Bytes,
}

impl RawResponse {
    /// True only for an exact `200 OK`.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// The `Content-Type` header, if present and valid UTF-8.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// A cloneable asynchronous HTTP fetcher.
///
/// Clones share the same underlying `reqwest::Client` and cookie jar, so
/// cookies set by one call (e.g. a warm-up request) are sent on later calls to
/// the same domain.
///
/// The client only attaches jar cookies to requests that carry no `Cookie`
/// header of their own. Callers that set one merge [`HttpFetcher::cookies_for`]
/// into it.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// The underlying client, reading and writing `jar`.
    inner: reqwest::Client,
    /// Cookies received so far.
    jar: Arc<Jar>,
    /// Default timeout applied when the caller does not pass one.
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher with the given default request timeout.
    ///
    /// # Errors
    /// Returns [`ViewerError::Fetch`] if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let inner = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| ViewerError::fetch("http client", e))?;

        Ok(Self { inner, jar, timeout })
    }

    /// The stored cookies that apply to `url`, as a `Cookie` header value.
    pub fn cookies_for(&self, url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let value = self.jar.cookies(&url)?;
        value.to_str().ok().map(str::to_string)
    }

    /// Performs a `GET` with the default timeout.
    pub async fn get(&self, url: &str, headers: Option<HeaderMap>) -> Result<RawResponse> {
        self.get_with_timeout(url, headers, self.timeout).await
    }

    /// Performs a `GET` and reads the whole body.
    ///
    /// Non-2xx statuses are *not* errors here; they come back with
    /// `success == false` so proxies can pass them through unchanged.
    ///
    /// # Errors
    /// * [`ViewerError::BadRequest`] if `url` is not an absolute URL.
    /// * [`ViewerError::Fetch`] on connection failure, timeout, or a truncated body.
    pub async fn get_with_timeout(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
        timeout: Duration,
    ) -> Result<RawResponse> {
        let full_url = Url::parse(url)
            .map_err(|e| ViewerError::BadRequest(format!("invalid URL {url}: {e}")))?;
        let mut req = self.inner.get(full_url).timeout(timeout);

        if let Some(h) = headers {
            req = req.headers(h);
        }

        let response = req.send().await.map_err(|e| ViewerError::fetch(url, e))?;
        let status = response.status();
        let resp_headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| ViewerError::fetch(url, e))?;

        Ok(RawResponse {
            status: status.as_u16(),
            success: status.is_success(),
            headers: resp_headers,
            body,
        })
    }
}
