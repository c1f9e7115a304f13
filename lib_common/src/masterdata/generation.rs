//! # Generations
//!
//! A [`Generation`] is one complete, immutable set of derived lookup maps built
//! from one batch of feed records. The store swaps whole generations, so a
//! reader holding an `Arc<Generation>` always sees maps from the same batch.
//!
//! ## Join rules:
//! - `card_event_map`: the lowest event id wins when a card appears in
//!   several events.
//! - `music_event_map`, `card_gacha_map`, `gacha_pickups`,
//!   `card_costume3d_map`, `costume3d_group_map`: values keep feed-file order
//!   and are not deduplicated.
//! - `event_virtual_live_map` / `virtual_live_event_map`: only events with a
//!   positive `virtualLiveId` that resolves in the virtual-live feed. Anything
//!   else is dropped without a warning.
//! - Links to unknown events are dropped the same way.
//!
//! Maps are `BTreeMap`s so two generations built from identical input
//! serialize to identical bytes.

use std::collections::{btree_map::Entry, BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::models::{
    CardCostume3d, Costume3d, Event, EventCard, EventInfo, EventMusic, Gacha, GachaInfo, VirtualLive,
    VirtualLiveInfo,
};

/// Raw feed records for one refresh cycle. Dropped once the generation is built.
#[derive(Debug, Clone, Default)]
pub struct FeedSet {
    /// `events.json`.
    pub events: Vec<Event>,
    /// `eventCards.json`.
    pub event_cards: Vec<EventCard>,
    /// `eventMusics.json`.
    pub event_musics: Vec<EventMusic>,
    /// `virtualLives.json`.
    pub virtual_lives: Vec<VirtualLive>,
    /// `gachas.json`.
    pub gachas: Vec<Gacha>,
    /// `cardCostume3ds.json`.
    pub card_costume3ds: Vec<CardCostume3d>,
    /// `costume3ds.json`.
    pub costume3ds: Vec<Costume3d>,
}

/// Record counts of the input feeds and sizes of the headline maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationCounts {
    /// Events loaded.
    pub events: usize,
    /// Event-card links loaded.
    pub event_cards: usize,
    /// Event-music links loaded.
    pub event_musics: usize,
    /// Virtual lives loaded.
    pub virtual_lives: usize,
    /// Gachas loaded.
    pub gachas: usize,
    /// Card-costume links loaded.
    pub card_costume3ds: usize,
    /// Costumes loaded.
    pub costume3ds: usize,
    /// Cards with a resolved event.
    pub mapped_cards: usize,
    /// Songs with at least one resolved event.
    pub mapped_musics: usize,
    /// Events with a resolved virtual live.
    pub mapped_virtual_lives: usize,
}

/// Summary of a generation, as returned by a refresh and served on the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStats {
    /// Monotonic per store; `0` is the empty generation present before any refresh.
    pub sequence: u64,
    /// When the generation was swapped in.
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Input and output sizes.
    pub counts: GenerationCounts,
    /// Non-critical feeds that failed to load and were treated as empty.
    pub degraded_feeds: Vec<String>,
}

/// One immutable set of derived maps.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    /// Identity and sizes.
    pub stats: GenerationStats,
    /// cardId → earliest event.
    pub card_event_map: Arc<BTreeMap<i64, EventInfo>>,
    /// musicId → events in feed order.
    pub music_event_map: Arc<BTreeMap<i64, Vec<EventInfo>>>,
    /// cardId → gachas picking it up, in feed order.
    pub card_gacha_map: Arc<BTreeMap<i64, Vec<GachaInfo>>>,
    /// eventId → virtual live.
    pub event_virtual_live_map: Arc<BTreeMap<i64, VirtualLiveInfo>>,
    /// virtualLiveId → event.
    pub virtual_live_event_map: Arc<BTreeMap<i64, EventInfo>>,
    /// `gachas.json` verbatim.
    pub gacha_list: Arc<Vec<Gacha>>,
    /// gachaId → picked-up card ids.
    pub gacha_pickups: Arc<BTreeMap<i64, Vec<i64>>>,
    /// cardId → costume ids.
    pub card_costume3d_map: Arc<BTreeMap<i64, Vec<i64>>>,
    /// costumeId → costume group id.
    pub costume3d_group_id_map: Arc<BTreeMap<i64, i64>>,
    /// costume group id → costumes.
    pub costume3d_group_map: Arc<BTreeMap<i64, Vec<Costume3d>>>,
}

impl Generation {
    /// Builds every derived map from `feeds` in one linear pass per feed.
    ///
    /// Pure: identical `feeds` always give identical maps.
    pub fn build(
        sequence: u64,
        refreshed_at: DateTime<Utc>,
        feeds: FeedSet,
        degraded_feeds: Vec<String>,
    ) -> Self {
        let FeedSet {
            events,
            event_cards,
            event_musics,
            virtual_lives,
            gachas,
            card_costume3ds,
            costume3ds,
        } = feeds;

        let event_lookup: HashMap<i64, &Event> = events.iter().map(|e| (e.id, e)).collect();

        let mut card_event_map: BTreeMap<i64, EventInfo> = BTreeMap::new();
        for link in &event_cards {
            let Some(event) = event_lookup.get(&link.event_id) else {
                continue;
            };
            match card_event_map.entry(link.card_id) {
                Entry::Vacant(slot) => {
                    slot.insert(EventInfo::from(*event));
                }
                Entry::Occupied(mut slot) => {
                    if event.id < slot.get().id {
                        slot.insert(EventInfo::from(*event));
                    }
                }
            }
        }

        let mut music_event_map: BTreeMap<i64, Vec<EventInfo>> = BTreeMap::new();
        for link in &event_musics {
            if let Some(event) = event_lookup.get(&link.event_id) {
                music_event_map
                    .entry(link.music_id)
                    .or_default()
                    .push(EventInfo::from(*event));
            }
        }

        let virtual_live_lookup: HashMap<i64, &VirtualLive> =
            virtual_lives.iter().map(|v| (v.id, v)).collect();
        let mut event_virtual_live_map = BTreeMap::new();
        let mut virtual_live_event_map = BTreeMap::new();
        for event in events.iter().filter(|e| e.virtual_live_id > 0) {
            if let Some(live) = virtual_live_lookup.get(&event.virtual_live_id) {
                event_virtual_live_map.insert(event.id, VirtualLiveInfo::from(*live));
                virtual_live_event_map.insert(event.virtual_live_id, EventInfo::from(event));
            }
        }

        let mut gacha_pickups: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        let mut card_gacha_map: BTreeMap<i64, Vec<GachaInfo>> = BTreeMap::new();
        for gacha in &gachas {
            let info = GachaInfo::from(gacha);
            for pickup in &gacha.gacha_pickups {
                gacha_pickups.entry(gacha.id).or_default().push(pickup.card_id);
                card_gacha_map.entry(pickup.card_id).or_default().push(info.clone());
            }
        }

        let mut card_costume3d_map: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for link in &card_costume3ds {
            card_costume3d_map.entry(link.card_id).or_default().push(link.costume3d_id);
        }

        let mut costume3d_group_id_map = BTreeMap::new();
        let mut costume3d_group_map: BTreeMap<i64, Vec<Costume3d>> = BTreeMap::new();
        for costume in &costume3ds {
            costume3d_group_id_map.insert(costume.id, costume.costume3d_group_id);
        }
        let costume_count = costume3ds.len();
        for costume in costume3ds {
            costume3d_group_map.entry(costume.costume3d_group_id).or_default().push(costume);
        }

        let counts = GenerationCounts {
            events: events.len(),
            event_cards: event_cards.len(),
            event_musics: event_musics.len(),
            virtual_lives: virtual_lives.len(),
            gachas: gachas.len(),
            card_costume3ds: card_costume3ds.len(),
            costume3ds: costume_count,
            mapped_cards: card_event_map.len(),
            mapped_musics: music_event_map.len(),
            mapped_virtual_lives: event_virtual_live_map.len(),
        };

        Self {
            stats: GenerationStats {
                sequence,
                refreshed_at: Some(refreshed_at),
                counts,
                degraded_feeds,
            },
            card_event_map: Arc::new(card_event_map),
            music_event_map: Arc::new(music_event_map),
            card_gacha_map: Arc::new(card_gacha_map),
            event_virtual_live_map: Arc::new(event_virtual_live_map),
            virtual_live_event_map: Arc::new(virtual_live_event_map),
            gacha_list: Arc::new(gachas),
            gacha_pickups: Arc::new(gacha_pickups),
            card_costume3d_map: Arc::new(card_costume3d_map),
            costume3d_group_id_map: Arc::new(costume3d_group_id_map),
            costume3d_group_map: Arc::new(costume3d_group_map),
        }
    }

    /// The generation's sequence number.
    pub fn sequence(&self) -> u64 {
        self.stats.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masterdata::models::GachaPickup;

    fn event(id: i64, name: &str, virtual_live_id: i64) -> Event {
        Event {
            id,
            name: name.to_string(),
            assetbundle_name: format!("event_{id}"),
            virtual_live_id,
        }
    }

    fn card_link(card_id: i64, event_id: i64) -> EventCard {
        EventCard {
            id: card_id * 100 + event_id,
            card_id,
            event_id,
        }
    }

    fn build(feeds: FeedSet) -> Generation {
        Generation::build(1, Utc::now(), feeds, Vec::new())
    }

    #[test]
    fn card_event_tie_break_prefers_lowest_event_id() {
        let g = build(FeedSet {
            events: vec![event(10, "Later", 0), event(5, "Earlier", 0)],
            event_cards: vec![card_link(42, 10), card_link(42, 5)],
            ..Default::default()
        });
        assert_eq!(g.card_event_map[&42].id, 5);
        assert_eq!(g.card_event_map[&42].name, "Earlier");

        // Order of links does not matter.
        let g = build(FeedSet {
            events: vec![event(10, "Later", 0), event(5, "Earlier", 0)],
            event_cards: vec![card_link(42, 5), card_link(42, 10)],
            ..Default::default()
        });
        assert_eq!(g.card_event_map[&42].id, 5);
    }

    #[test]
    fn links_to_unknown_events_are_dropped() {
        let g = build(FeedSet {
            events: vec![event(1, "A", 0)],
            event_cards: vec![card_link(7, 99)],
            event_musics: vec![EventMusic { event_id: 99, music_id: 3, seq: 1 }],
            ..Default::default()
        });
        assert!(g.card_event_map.is_empty());
        assert!(g.music_event_map.is_empty());
    }

    #[test]
    fn music_events_keep_feed_order_and_duplicates() {
        let g = build(FeedSet {
            events: vec![event(1, "A", 0), event(2, "B", 0)],
            event_musics: vec![
                EventMusic { event_id: 2, music_id: 9, seq: 1 },
                EventMusic { event_id: 1, music_id: 9, seq: 2 },
                EventMusic { event_id: 2, music_id: 9, seq: 3 },
            ],
            ..Default::default()
        });
        let ids: Vec<i64> = g.music_event_map[&9].iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 1, 2]);
    }

    #[test]
    fn virtual_live_maps_only_include_resolved_positive_links() {
        let g = build(FeedSet {
            events: vec![event(1, "A", 0), event(2, "B", 5)],
            virtual_lives: vec![VirtualLive {
                id: 5,
                name: "VL".into(),
                assetbundle_name: "vl_5".into(),
            }],
            ..Default::default()
        });

        assert_eq!(g.event_virtual_live_map.len(), 1);
        assert_eq!(g.event_virtual_live_map[&2].id, 5);
        assert_eq!(g.event_virtual_live_map[&2].name, "VL");
        assert_eq!(g.virtual_live_event_map.len(), 1);
        assert_eq!(g.virtual_live_event_map[&5].id, 2);
        assert_eq!(g.virtual_live_event_map[&5].name, "B");
        assert!(!g.event_virtual_live_map.contains_key(&1));
    }

    #[test]
    fn dangling_virtual_live_reference_is_dropped() {
        let g = build(FeedSet {
            events: vec![event(3, "C", 99)],
            virtual_lives: vec![VirtualLive { id: 5, ..Default::default() }],
            ..Default::default()
        });
        assert!(!g.event_virtual_live_map.contains_key(&3));
        assert!(!g.virtual_live_event_map.contains_key(&99));
    }

    #[test]
    fn gacha_pickups_and_card_gacha_map() {
        let g = build(FeedSet {
            gachas: vec![Gacha {
                id: 7,
                name: "Pickup Gacha".into(),
                gacha_pickups: vec![
                    GachaPickup { gacha_id: 7, card_id: 100 },
                    GachaPickup { gacha_id: 7, card_id: 101 },
                ],
                ..Default::default()
            }],
            ..Default::default()
        });

        assert_eq!(g.gacha_pickups[&7], vec![100, 101]);
        assert!(g.card_gacha_map[&100].iter().any(|info| info.id == 7));
        assert_eq!(g.card_gacha_map[&101][0].name, "Pickup Gacha");
        assert_eq!(g.gacha_list.len(), 1);
    }

    #[test]
    fn costume_joins() {
        let costume = |id: i64, group: i64| Costume3d {
            id,
            costume3d_group_id: group,
            ..Default::default()
        };
        let g = build(FeedSet {
            card_costume3ds: vec![
                CardCostume3d { card_id: 1, costume3d_id: 11 },
                CardCostume3d { card_id: 1, costume3d_id: 12 },
            ],
            costume3ds: vec![costume(11, 3), costume(12, 3), costume(13, 4)],
            ..Default::default()
        });

        assert_eq!(g.card_costume3d_map[&1], vec![11, 12]);
        assert_eq!(g.costume3d_group_id_map[&12], 3);
        let group: Vec<i64> = g.costume3d_group_map[&3].iter().map(|c| c.id).collect();
        assert_eq!(group, vec![11, 12]);
        assert_eq!(g.stats.counts.costume3ds, 3);
    }

    #[test]
    fn counts_reflect_inputs_and_outputs() {
        let g = Generation::build(
            4,
            Utc::now(),
            FeedSet {
                events: vec![event(1, "A", 0)],
                event_cards: vec![card_link(1, 1), card_link(2, 1)],
                ..Default::default()
            },
            vec!["gachas".to_string()],
        );
        assert_eq!(g.sequence(), 4);
        assert_eq!(g.stats.counts.events, 1);
        assert_eq!(g.stats.counts.event_cards, 2);
        assert_eq!(g.stats.counts.mapped_cards, 2);
        assert_eq!(g.stats.degraded_feeds, vec!["gachas"]);
    }
}
