//! # Master Data Models
//!
//! Serde shapes for the raw feed records and for the projections the derived
//! maps hold. Feed records decode leniently: every field defaults when absent
//! or `null`, and unknown fields are ignored, since the upstream schema grows
//! over time.

use serde::{Deserialize, Deserializer, Serialize};

/// Decodes a field, mapping an explicit `null` to the type's default.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One row of `events.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
    /// Event id; lower ids are older events.
    #[serde(deserialize_with = "null_default")]
    pub id: i64,
    /// Display name.
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    /// Asset bundle used for banners.
    #[serde(deserialize_with = "null_default")]
    pub assetbundle_name: String,
    /// Linked virtual live, `0` when none.
    #[serde(deserialize_with = "null_default")]
    pub virtual_live_id: i64,
}

/// One row of `eventCards.json`: a card featured in an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventCard {
    /// Row id.
    #[serde(deserialize_with = "null_default")]
    pub id: i64,
    /// The featured card.
    #[serde(deserialize_with = "null_default")]
    pub card_id: i64,
    /// The event featuring it.
    #[serde(deserialize_with = "null_default")]
    pub event_id: i64,
}

/// One row of `eventMusics.json`: a song introduced by an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventMusic {
    /// The event.
    #[serde(deserialize_with = "null_default")]
    pub event_id: i64,
    /// The song.
    #[serde(deserialize_with = "null_default")]
    pub music_id: i64,
    /// Ordering hint within the event.
    #[serde(deserialize_with = "null_default")]
    pub seq: i64,
}

/// One row of `virtualLives.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VirtualLive {
    /// Virtual live id.
    #[serde(deserialize_with = "null_default")]
    pub id: i64,
    /// Display name.
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    /// Asset bundle name.
    #[serde(deserialize_with = "null_default")]
    pub assetbundle_name: String,
}

/// A featured card inside a gacha.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GachaPickup {
    /// Owning gacha.
    #[serde(deserialize_with = "null_default")]
    pub gacha_id: i64,
    /// Featured card.
    #[serde(deserialize_with = "null_default")]
    pub card_id: i64,
}

/// Pull rate for one rarity tier of a gacha.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GachaCardRarityRate {
    /// Row id.
    #[serde(deserialize_with = "null_default")]
    pub id: i64,
    /// Owning gacha.
    #[serde(deserialize_with = "null_default")]
    pub gacha_id: i64,
    /// Rarity tier, e.g. `rarity_4`.
    #[serde(deserialize_with = "null_default")]
    pub card_rarity_type: String,
    /// Percentage rate.
    #[serde(deserialize_with = "null_default")]
    pub rate: f64,
}

/// One row of `gachas.json`, kept verbatim in the gacha list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Gacha {
    /// Gacha id.
    #[serde(deserialize_with = "null_default")]
    pub id: i64,
    /// Gacha kind, e.g. `ceil` or `normal`.
    #[serde(deserialize_with = "null_default")]
    pub gacha_type: String,
    /// Display name.
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    /// Upstream ordering hint.
    #[serde(deserialize_with = "null_default")]
    pub seq: i64,
    /// Asset bundle name.
    #[serde(deserialize_with = "null_default")]
    pub assetbundle_name: String,
    /// Start time, epoch milliseconds.
    #[serde(deserialize_with = "null_default")]
    pub start_at: i64,
    /// End time, epoch milliseconds.
    #[serde(deserialize_with = "null_default")]
    pub end_at: i64,
    /// Featured cards in feed order.
    #[serde(deserialize_with = "null_default")]
    pub gacha_pickups: Vec<GachaPickup>,
    /// Rarity rates.
    #[serde(deserialize_with = "null_default")]
    pub gacha_card_rarity_rates: Vec<GachaCardRarityRate>,
}

/// One row of `cardCostume3ds.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardCostume3d {
    /// The card.
    #[serde(deserialize_with = "null_default")]
    pub card_id: i64,
    /// A 3D costume unlocked by it.
    #[serde(deserialize_with = "null_default")]
    pub costume3d_id: i64,
}

/// One row of `costume3ds.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Costume3d {
    /// Costume id.
    #[serde(deserialize_with = "null_default")]
    pub id: i64,
    /// Group shared by color variants of the same costume.
    #[serde(deserialize_with = "null_default")]
    pub costume3d_group_id: i64,
    /// Costume kind.
    #[serde(deserialize_with = "null_default")]
    pub costume3d_type: String,
    /// Display name.
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    /// Body part, e.g. `body` or `head`.
    #[serde(deserialize_with = "null_default")]
    pub part_type: String,
    /// Color variant id.
    #[serde(deserialize_with = "null_default")]
    pub color_id: i64,
    /// Color variant name.
    pub color_name: Option<String>,
    /// Character the costume belongs to.
    #[serde(deserialize_with = "null_default")]
    pub character_id: i64,
    /// Rarity tier.
    #[serde(deserialize_with = "null_default")]
    pub costume3d_rarity: String,
    /// Asset bundle name.
    #[serde(deserialize_with = "null_default")]
    pub assetbundle_name: String,
    /// Designer credit.
    pub designer: Option<String>,
    /// Release time, epoch milliseconds.
    #[serde(deserialize_with = "null_default")]
    pub published_at: i64,
    /// Archive release time, epoch milliseconds.
    pub archive_published_at: Option<i64>,
}

/// Projection of an [`Event`] stored in derived maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    /// Event id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Asset bundle name.
    pub assetbundle_name: String,
}

impl From<&Event> for EventInfo {
    fn from(e: &Event) -> Self {
        Self {
            id: e.id,
            name: e.name.clone(),
            assetbundle_name: e.assetbundle_name.clone(),
        }
    }
}

/// Projection of a [`VirtualLive`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualLiveInfo {
    /// Virtual live id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Asset bundle name.
    pub assetbundle_name: String,
}

impl From<&VirtualLive> for VirtualLiveInfo {
    fn from(v: &VirtualLive) -> Self {
        Self {
            id: v.id,
            name: v.name.clone(),
            assetbundle_name: v.assetbundle_name.clone(),
        }
    }
}

/// Projection of a [`Gacha`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GachaInfo {
    /// Gacha id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Asset bundle name.
    pub assetbundle_name: String,
}

impl From<&Gacha> for GachaInfo {
    fn from(g: &Gacha) -> Self {
        Self {
            id: g.id,
            name: g.name.clone(),
            assetbundle_name: g.assetbundle_name.clone(),
        }
    }
}
