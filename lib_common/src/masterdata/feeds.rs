//! # Feed Catalog & Fetcher
//!
//! The catalog names the seven master-data feeds, where they live upstream and
//! whether a refresh can survive without them. The fetcher loads one feed at a
//! time, local snapshot first and network second.
//!
//! ## Loading rules:
//! - The local snapshot is `<local_dir>/<last URL path segment>`.
//! - A snapshot that is missing, unreadable, or fails to decode is skipped in
//!   favour of a single remote `GET` bounded by [`FEED_TIMEOUT`].
//! - A feed is always wholly local or wholly remote. There are no retries.
//! - Snapshots are read-only input; nothing is ever written back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, info, warn};

use crate::error::{Result, ViewerError};
use crate::retrieve::HttpFetcher;

/// Host serving the critical event feeds.
pub const SEKAI_MASTER_BASE: &str = "https://sekaimaster.exmeaning.com/master";
/// Host serving the virtual-live, gacha and costume feeds.
pub const HARUKI_MASTER_BASE: &str =
    "https://raw.githubusercontent.com/Team-Haruki/haruki-sekai-master/main/master";

/// Upper bound for one remote feed download.
pub const FEED_TIMEOUT: Duration = Duration::from_secs(60);

/// One feed: a name for logs and errors, its URL, and whether it is critical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSpec {
    /// Stable feed name, e.g. `eventCards`.
    pub name: &'static str,
    /// Remote location of the JSON document.
    pub url: String,
    /// Critical feeds abort a refresh when they cannot be loaded.
    pub critical: bool,
}

impl FeedSpec {
    fn new(name: &'static str, base: &str, critical: bool) -> Self {
        Self {
            name,
            url: format!("{}/{}.json", base.trim_end_matches('/'), name),
            critical,
        }
    }

    /// The snapshot file name: the URL's last path segment.
    pub fn file_name(&self) -> &str {
        let path = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        path.rsplit('/').next().unwrap_or(path)
    }
}

/// The full set of feeds a refresh loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCatalog {
    /// `events.json` (critical).
    pub events: FeedSpec,
    /// `eventCards.json` (critical).
    pub event_cards: FeedSpec,
    /// `eventMusics.json` (critical).
    pub event_musics: FeedSpec,
    /// `virtualLives.json`.
    pub virtual_lives: FeedSpec,
    /// `gachas.json`.
    pub gachas: FeedSpec,
    /// `cardCostume3ds.json`.
    pub card_costume3ds: FeedSpec,
    /// `costume3ds.json`.
    pub costume3ds: FeedSpec,
}

impl Default for FeedCatalog {
    fn default() -> Self {
        Self::from_bases(SEKAI_MASTER_BASE, HARUKI_MASTER_BASE)
    }
}

impl FeedCatalog {
    /// Builds a catalog with the critical feeds under `critical_base` and the
    /// rest under `extra_base`. Useful for pointing at a mirror.
    pub fn from_bases(critical_base: &str, extra_base: &str) -> Self {
        Self {
            events: FeedSpec::new("events", critical_base, true),
            event_cards: FeedSpec::new("eventCards", critical_base, true),
            event_musics: FeedSpec::new("eventMusics", critical_base, true),
            virtual_lives: FeedSpec::new("virtualLives", extra_base, false),
            gachas: FeedSpec::new("gachas", extra_base, false),
            card_costume3ds: FeedSpec::new("cardCostume3ds", extra_base, false),
            costume3ds: FeedSpec::new("costume3ds", extra_base, false),
        }
    }

    /// All feeds in fetch order.
    pub fn all(&self) -> [&FeedSpec; 7] {
        [
            &self.events,
            &self.event_cards,
            &self.event_musics,
            &self.virtual_lives,
            &self.gachas,
            &self.card_costume3ds,
            &self.costume3ds,
        ]
    }

    /// Replaces the URL of the feed called `name`. Returns `false` for an unknown name.
    pub fn override_url(&mut self, name: &str, url: impl Into<String>) -> bool {
        let spec = match name {
            "events" => &mut self.events,
            "eventCards" => &mut self.event_cards,
            "eventMusics" => &mut self.event_musics,
            "virtualLives" => &mut self.virtual_lives,
            "gachas" => &mut self.gachas,
            "cardCostume3ds" => &mut self.card_costume3ds,
            "costume3ds" => &mut self.costume3ds,
            _ => return false,
        };
        spec.url = url.into();
        true
    }
}

/// Where a feed document ended up coming from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    /// The local snapshot file.
    Local,
    /// The remote URL.
    Remote,
}

/// Loads feed documents, local snapshot first.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    http: HttpFetcher,
    local_dir: PathBuf,
}

impl FeedFetcher {
    /// Creates a fetcher reading snapshots from `local_dir`.
    pub fn new(http: HttpFetcher, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            http,
            local_dir: local_dir.into(),
        }
    }

    /// The snapshot directory.
    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// The snapshot path for `feed`.
    pub fn local_path(&self, feed: &FeedSpec) -> PathBuf {
        self.local_dir.join(feed.file_name())
    }

    /// Loads the raw bytes of `feed`, accepting any syntactically valid JSON.
    pub async fn load_raw(&self, feed: &FeedSpec) -> Result<(FeedSource, Bytes)> {
        let (source, bytes, _) = self.load_document::<IgnoredAny>(feed).await?;
        Ok((source, bytes))
    }

    /// Loads and decodes `feed` into `T`.
    ///
    /// # Errors
    /// * [`ViewerError::Fetch`] when the remote fallback fails or returns non-200.
    /// * [`ViewerError::Parse`] when the remote payload does not decode.
    ///
    /// Both carry the feed name as their target.
    pub async fn load<T: DeserializeOwned>(&self, feed: &FeedSpec) -> Result<T> {
        let (_, _, value) = self.load_document(feed).await?;
        Ok(value)
    }

    async fn load_document<T: DeserializeOwned>(&self, feed: &FeedSpec) -> Result<(FeedSource, Bytes, T)> {
        let local_path = self.local_path(feed);

        match tokio::fs::read(&local_path).await {
            Ok(content) => match serde_json::from_slice::<T>(&content) {
                Ok(value) => {
                    info!(feed = feed.name, source = "local", path = %local_path.display(), "Loaded feed");
                    return Ok((FeedSource::Local, Bytes::from(content), value));
                }
                Err(e) => {
                    warn!(feed = feed.name, path = %local_path.display(), error = %e, "Local snapshot does not decode, falling back to remote");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(feed = feed.name, path = %local_path.display(), "No local snapshot");
            }
            Err(e) => {
                warn!(feed = feed.name, path = %local_path.display(), error = %e, "Local snapshot unreadable, falling back to remote");
            }
        }

        let body = self.fetch_remote(feed).await?;
        let value = serde_json::from_slice::<T>(&body).map_err(|e| ViewerError::parse(feed.name, e))?;
        info!(feed = feed.name, source = "remote", bytes = body.len(), "Loaded feed");
        Ok((FeedSource::Remote, body, value))
    }

    async fn fetch_remote(&self, feed: &FeedSpec) -> Result<Bytes> {
        let response = self
            .http
            .get_with_timeout(&feed.url, None, FEED_TIMEOUT)
            .await
            .map_err(|e| match e {
                ViewerError::Fetch { reason, .. } => ViewerError::fetch(feed.name, reason),
                other => ViewerError::fetch(feed.name, other),
            })?;

        if !response.is_ok() {
            return Err(ViewerError::fetch(feed.name, format!("bad status: {}", response.status)));
        }
        Ok(response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masterdata::models::Event;
    use crate::retrieve::mock_server::{MockRoute, MockServer};

    fn fetcher(dir: &Path) -> FeedFetcher {
        FeedFetcher::new(HttpFetcher::new(Duration::from_secs(5)).unwrap(), dir)
    }

    fn events_feed(url: String) -> FeedSpec {
        FeedSpec {
            name: "events",
            url,
            critical: true,
        }
    }

    #[test]
    fn default_catalog_urls() {
        let catalog = FeedCatalog::default();
        assert_eq!(catalog.events.url, "https://sekaimaster.exmeaning.com/master/events.json");
        assert_eq!(
            catalog.costume3ds.url,
            "https://raw.githubusercontent.com/Team-Haruki/haruki-sekai-master/main/master/costume3ds.json"
        );
        let critical: Vec<_> = catalog.all().iter().filter(|f| f.critical).map(|f| f.name).collect();
        assert_eq!(critical, vec!["events", "eventCards", "eventMusics"]);
    }

    #[test]
    fn file_name_is_last_path_segment() {
        let spec = events_feed("http://mirror.local/a/b/events.json?v=3".into());
        assert_eq!(spec.file_name(), "events.json");
    }

    #[test]
    fn override_url_by_name() {
        let mut catalog = FeedCatalog::default();
        assert!(catalog.override_url("gachas", "http://mirror/gachas.json"));
        assert_eq!(catalog.gachas.url, "http://mirror/gachas.json");
        assert!(!catalog.override_url("cards", "http://mirror/cards.json"));
    }

    #[tokio::test]
    async fn local_snapshot_wins_without_network() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("events.json"), r#"[{"id":1,"name":"A"}]"#).unwrap();
        let server = MockServer::start(vec![MockRoute::json("/events.json", 200, "[]")]);

        let events: Vec<Event> = fetcher(dir.path())
            .load(&events_feed(server.url("/events.json")))
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(server.hits("/events.json"), 0);
    }

    #[tokio::test]
    async fn corrupt_snapshot_falls_back_to_remote_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("events.json"), r#"[{"id":1,"name":"A"},"#).unwrap();
        let server = MockServer::start(vec![MockRoute::json(
            "/events.json",
            200,
            r#"[{"id":7,"name":"Remote"}]"#,
        )]);

        let (source, bytes) = fetcher(dir.path())
            .load_raw(&events_feed(server.url("/events.json")))
            .await
            .unwrap();

        assert_eq!(source, FeedSource::Remote);
        assert_eq!(&bytes[..], br#"[{"id":7,"name":"Remote"}]"#);
        assert_eq!(server.hits("/events.json"), 1);
    }

    #[tokio::test]
    async fn missing_snapshot_uses_remote() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start(vec![MockRoute::json("/events.json", 200, r#"[{"id":3}]"#)]);

        let events: Vec<Event> = fetcher(dir.path())
            .load(&events_feed(server.url("/events.json")))
            .await
            .unwrap();

        assert_eq!(events[0].id, 3);
    }

    #[tokio::test]
    async fn non_200_is_a_fetch_error_named_after_the_feed() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start(vec![MockRoute::json("/events.json", 500, "oops")]);

        let err = fetcher(dir.path())
            .load::<Vec<Event>>(&events_feed(server.url("/events.json")))
            .await
            .unwrap_err();

        match err {
            ViewerError::Fetch { target, reason } => {
                assert_eq!(target, "events");
                assert!(reason.contains("500"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_remote_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start(vec![MockRoute::json("/events.json", 200, "{not json")]);

        let err = fetcher(dir.path())
            .load::<Vec<Event>>(&events_feed(server.url("/events.json")))
            .await
            .unwrap_err();

        assert!(matches!(err, ViewerError::Parse { ref target, .. } if target == "events"));
    }

    #[tokio::test]
    async fn unreachable_remote_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetcher(dir.path())
            .load::<Vec<Event>>(&events_feed("http://127.0.0.1:9/events.json".into()))
            .await
            .unwrap_err();

        assert!(matches!(err, ViewerError::Fetch { ref target, .. } if target == "events"));
    }
}
