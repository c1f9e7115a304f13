//! # Master Store
//!
//! Owns the live [`Generation`] and rebuilds it on demand.
//!
//! ## Concurrency:
//! - The live generation sits behind a `tokio::sync::RwLock<Arc<Generation>>`.
//!   Readers clone the `Arc` under a shared lock and release it immediately; the
//!   clone stays valid and consistent however many refreshes follow.
//! - `refresh` fetches and builds with no lock on the live generation, then
//!   takes the write lock only to replace the `Arc`.
//! - Refreshes are serialized among themselves so sequence numbers follow swap
//!   order.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use super::feeds::{FeedCatalog, FeedFetcher, FeedSpec};
use super::generation::{FeedSet, Generation, GenerationStats};
use super::models::{Costume3d, EventInfo, Gacha, GachaInfo, VirtualLiveInfo};
use crate::error::Result;

/// The aggregation store.
pub struct MasterStore {
    fetcher: FeedFetcher,
    catalog: FeedCatalog,
    current: RwLock<Arc<Generation>>,
    refresh_guard: Mutex<()>,
}

impl MasterStore {
    /// Creates a store holding the empty generation (sequence `0`).
    pub fn new(fetcher: FeedFetcher, catalog: FeedCatalog) -> Self {
        Self {
            fetcher,
            catalog,
            current: RwLock::new(Arc::new(Generation::default())),
            refresh_guard: Mutex::new(()),
        }
    }

    /// The feeds this store loads.
    pub fn catalog(&self) -> &FeedCatalog {
        &self.catalog
    }

    /// Loads every feed, builds a new generation and swaps it in.
    ///
    /// Critical feeds load first, in order events → eventCards → eventMusics;
    /// any failure there aborts and leaves the live generation untouched. The
    /// remaining feeds are best effort and degrade to empty on failure.
    pub async fn refresh(&self) -> Result<GenerationStats> {
        let _serial = self.refresh_guard.lock().await;
        info!("Updating master data...");

        let events = self.load_critical(&self.catalog.events).await?;
        let event_cards = self.load_critical(&self.catalog.event_cards).await?;
        let event_musics = self.load_critical(&self.catalog.event_musics).await?;

        let mut degraded = Vec::new();
        let virtual_lives = self.load_optional(&self.catalog.virtual_lives, &mut degraded).await;
        let gachas = self.load_optional(&self.catalog.gachas, &mut degraded).await;
        let card_costume3ds = self.load_optional(&self.catalog.card_costume3ds, &mut degraded).await;
        let costume3ds = self.load_optional(&self.catalog.costume3ds, &mut degraded).await;

        let feeds = FeedSet {
            events,
            event_cards,
            event_musics,
            virtual_lives,
            gachas,
            card_costume3ds,
            costume3ds,
        };

        let sequence = self.current.read().await.sequence() + 1;
        let generation = Arc::new(Generation::build(sequence, Utc::now(), feeds, degraded));
        let stats = generation.stats.clone();

        *self.current.write().await = generation;

        let c = &stats.counts;
        info!(
            sequence = stats.sequence,
            cards = c.mapped_cards,
            musics = c.mapped_musics,
            event_virtual_lives = c.mapped_virtual_lives,
            gachas = c.gachas,
            costumes = c.costume3ds,
            degraded = ?stats.degraded_feeds,
            "Master data updated"
        );
        Ok(stats)
    }

    async fn load_critical<T: DeserializeOwned>(&self, feed: &FeedSpec) -> Result<T> {
        self.fetcher.load(feed).await.map_err(|e| {
            error!(feed = feed.name, error = %e, "Critical feed failed, keeping previous generation");
            e
        })
    }

    async fn load_optional<T: DeserializeOwned + Default>(&self, feed: &FeedSpec, degraded: &mut Vec<String>) -> T {
        match self.fetcher.load(feed).await {
            Ok(value) => value,
            Err(e) => {
                warn!(feed = feed.name, error = %e, "Optional feed failed, treating as empty");
                degraded.push(feed.name.to_string());
                T::default()
            }
        }
    }

    /// The live generation. Stays valid and unchanged after later refreshes.
    pub async fn snapshot(&self) -> Arc<Generation> {
        Arc::clone(&*self.current.read().await)
    }

    /// Stats of the live generation.
    pub async fn stats(&self) -> GenerationStats {
        self.current.read().await.stats.clone()
    }

    /// cardId → earliest event.
    pub async fn card_event_map(&self) -> Arc<BTreeMap<i64, EventInfo>> {
        Arc::clone(&self.current.read().await.card_event_map)
    }

    /// musicId → events in feed order.
    pub async fn music_event_map(&self) -> Arc<BTreeMap<i64, Vec<EventInfo>>> {
        Arc::clone(&self.current.read().await.music_event_map)
    }

    /// cardId → gachas picking it up.
    pub async fn card_gacha_map(&self) -> Arc<BTreeMap<i64, Vec<GachaInfo>>> {
        Arc::clone(&self.current.read().await.card_gacha_map)
    }

    /// eventId → virtual live.
    pub async fn event_virtual_live_map(&self) -> Arc<BTreeMap<i64, VirtualLiveInfo>> {
        Arc::clone(&self.current.read().await.event_virtual_live_map)
    }

    /// virtualLiveId → event.
    pub async fn virtual_live_event_map(&self) -> Arc<BTreeMap<i64, EventInfo>> {
        Arc::clone(&self.current.read().await.virtual_live_event_map)
    }

    /// The gacha feed verbatim.
    pub async fn gacha_list(&self) -> Arc<Vec<Gacha>> {
        Arc::clone(&self.current.read().await.gacha_list)
    }

    /// gachaId → picked-up card ids.
    pub async fn gacha_pickups(&self) -> Arc<BTreeMap<i64, Vec<i64>>> {
        Arc::clone(&self.current.read().await.gacha_pickups)
    }

    /// cardId → costume ids.
    pub async fn card_costume3d_map(&self) -> Arc<BTreeMap<i64, Vec<i64>>> {
        Arc::clone(&self.current.read().await.card_costume3d_map)
    }

    /// costumeId → costume group id.
    pub async fn costume3d_group_id_map(&self) -> Arc<BTreeMap<i64, i64>> {
        Arc::clone(&self.current.read().await.costume3d_group_id_map)
    }

    /// costume group id → costumes.
    pub async fn costume3d_group_map(&self) -> Arc<BTreeMap<i64, Vec<Costume3d>>> {
        Arc::clone(&self.current.read().await.costume3d_group_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewerError;
    use crate::retrieve::HttpFetcher;
    use std::path::Path;
    use std::time::Duration;

    const DEAD: &str = "http://127.0.0.1:9";

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn write_critical(dir: &Path) {
        write(
            dir,
            "events.json",
            r#"[{"id":1,"name":"A","assetbundleName":"a","virtualLiveId":0},
                {"id":2,"name":"B","assetbundleName":"b","virtualLiveId":5}]"#,
        );
        write(dir, "eventCards.json", r#"[{"id":1,"cardId":10,"eventId":2},{"id":2,"cardId":10,"eventId":1}]"#);
        write(dir, "eventMusics.json", r#"[{"eventId":1,"musicId":3,"seq":1}]"#);
    }

    /// A store whose remote URLs all point at a closed port, so only local
    /// snapshots can succeed.
    fn offline_store(dir: &Path) -> MasterStore {
        let http = HttpFetcher::new(Duration::from_secs(2)).unwrap();
        MasterStore::new(FeedFetcher::new(http, dir), FeedCatalog::from_bases(DEAD, DEAD))
    }

    #[tokio::test]
    async fn starts_with_empty_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = offline_store(dir.path());
        assert_eq!(store.stats().await.sequence, 0);
        assert!(store.card_event_map().await.is_empty());
        assert!(store.gacha_list().await.is_empty());
    }

    #[tokio::test]
    async fn refresh_builds_maps_and_degrades_optional_feeds() {
        let dir = tempfile::tempdir().unwrap();
        write_critical(dir.path());
        write(dir.path(), "virtualLives.json", r#"[{"id":5,"name":"VL","assetbundleName":"vl"}]"#);
        let store = offline_store(dir.path());

        let stats = store.refresh().await.unwrap();

        assert_eq!(stats.sequence, 1);
        assert_eq!(stats.degraded_feeds, vec!["gachas", "cardCostume3ds", "costume3ds"]);
        assert_eq!(store.card_event_map().await[&10].id, 1);
        assert_eq!(store.music_event_map().await[&3][0].name, "A");
        assert_eq!(store.event_virtual_live_map().await[&2].name, "VL");
        assert_eq!(store.virtual_live_event_map().await[&5].id, 2);
        assert!(store.gacha_list().await.is_empty());
        assert!(store.costume3d_group_map().await.is_empty());
    }

    #[tokio::test]
    async fn critical_failure_keeps_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        write_critical(dir.path());
        let store = offline_store(dir.path());
        store.refresh().await.unwrap();
        let before = store.snapshot().await;

        std::fs::remove_file(dir.path().join("eventMusics.json")).unwrap();
        let err = store.refresh().await.unwrap_err();

        assert!(matches!(err, ViewerError::Fetch { ref target, .. } if target == "eventMusics"));
        let after = store.snapshot().await;
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.sequence(), 1);
    }

    #[tokio::test]
    async fn critical_failure_before_first_refresh_leaves_empty_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = offline_store(dir.path());
        assert!(store.refresh().await.is_err());
        assert_eq!(store.stats().await.sequence, 0);
    }

    #[tokio::test]
    async fn refresh_is_idempotent_for_identical_inputs() {
        let dir = tempfile::tempdir().unwrap();
        write_critical(dir.path());
        write(
            dir.path(),
            "gachas.json",
            r#"[{"id":7,"name":"G","gachaPickups":[{"gachaId":7,"cardId":100},{"gachaId":7,"cardId":101}]}]"#,
        );
        let store = offline_store(dir.path());

        let dump = |g: &Generation| {
            serde_json::to_string(&(
                &*g.card_event_map,
                &*g.music_event_map,
                &*g.card_gacha_map,
                &*g.event_virtual_live_map,
                &*g.virtual_live_event_map,
                &*g.gacha_list,
                &*g.gacha_pickups,
                &*g.card_costume3d_map,
                &*g.costume3d_group_id_map,
                &*g.costume3d_group_map,
            ))
            .unwrap()
        };

        store.refresh().await.unwrap();
        let first = dump(&*store.snapshot().await);
        store.refresh().await.unwrap();
        let second = store.snapshot().await;

        assert_eq!(second.sequence(), 2);
        assert_eq!(first, dump(&*second));
    }

    #[tokio::test]
    async fn snapshot_held_across_refresh_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        write_critical(dir.path());
        let store = offline_store(dir.path());
        store.refresh().await.unwrap();

        let held = store.snapshot().await;
        let held_cards = store.card_event_map().await;

        write(dir.path(), "events.json", r#"[{"id":1,"name":"Renamed"}]"#);
        store.refresh().await.unwrap();

        assert_eq!(held.sequence(), 1);
        assert_eq!(held.card_event_map[&10].name, "A");
        assert_eq!(held_cards[&10].name, "A");
        assert_eq!(store.card_event_map().await[&10].name, "Renamed");
    }

    #[tokio::test]
    async fn null_fields_in_critical_feeds_do_not_abort_refresh() {
        let dir = tempfile::tempdir().unwrap();
        write_critical(dir.path());
        write(
            dir.path(),
            "events.json",
            r#"[{"id":1,"name":null,"assetbundleName":null,"virtualLiveId":null}]"#,
        );
        let store = offline_store(dir.path());

        let stats = store.refresh().await.unwrap();

        assert_eq!(stats.sequence, 1);
        let event = &store.card_event_map().await[&10];
        assert_eq!(event.id, 1);
        assert_eq!(event.name, "");
        assert_eq!(event.assetbundle_name, "");
    }

    /// Generation `n` has one event named `gen{n}` that owns cards `100..100+n`
    /// and music `3`.
    fn write_generation(dir: &Path, n: usize) {
        write(dir, "events.json", &format!(r#"[{{"id":1,"name":"gen{n}"}}]"#));
        let cards: Vec<String> = (0..n)
            .map(|i| format!(r#"{{"id":{i},"cardId":{},"eventId":1}}"#, 100 + i))
            .collect();
        write(dir, "eventCards.json", &format!("[{}]", cards.join(",")));
        write(dir, "eventMusics.json", r#"[{"eventId":1,"musicId":3,"seq":1}]"#);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_a_mixed_generation() {
        let dir = tempfile::tempdir().unwrap();
        write_generation(dir.path(), 1);
        let store = Arc::new(offline_store(dir.path()));
        store.refresh().await.unwrap();

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            readers.push(tokio::spawn(async move {
                for _ in 0..200 {
                    let g = store.snapshot().await;
                    let name = g.music_event_map[&3][0].name.clone();
                    let n: usize = name.trim_start_matches("gen").parse().unwrap();

                    assert_eq!(n as u64, g.sequence());
                    assert_eq!(g.card_event_map.len(), n);
                    assert!(g.card_event_map.values().all(|e| e.name == name));
                    assert_eq!(g.stats.counts.mapped_cards, n);
                    tokio::task::yield_now().await;
                }
            }));
        }

        for n in 2..=6 {
            write_generation(dir.path(), n);
            store.refresh().await.unwrap();
        }
        for r in readers {
            r.await.unwrap();
        }
        assert_eq!(store.stats().await.sequence, 6);
        assert_eq!(store.card_event_map().await.len(), 6);
    }
}
