//! # Gacha Queries
//!
//! Search, sort and pagination over one generation's gacha list, plus the
//! single-gacha detail lookup. Both read from a [`Generation`] snapshot so a
//! response never mixes two refreshes.

use serde::{Deserialize, Serialize};

use super::generation::Generation;
use super::models::Gacha;
use crate::error::{Result, ViewerError};

/// Page size used when the caller gives none or a non-positive one.
pub const DEFAULT_PAGE_SIZE: usize = 24;

/// Query-string parameters of the gacha list endpoint.
///
/// Numbers arrive as strings so that garbage falls back to defaults instead of
/// rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GachaListQuery {
    /// 1-based page number.
    pub page: Option<String>,
    /// Page size.
    pub limit: Option<String>,
    /// Case-insensitive name fragment, or an exact id.
    pub search: Option<String>,
    /// `id`, anything else sorts by `startAt`.
    pub sort_by: Option<String>,
    /// `asc`, anything else is descending.
    pub sort_order: Option<String>,
}

/// One row of the list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GachaListItem {
    /// Gacha id.
    pub id: i64,
    /// Gacha kind.
    pub gacha_type: String,
    /// Display name.
    pub name: String,
    /// Asset bundle name.
    pub assetbundle_name: String,
    /// Start time, epoch milliseconds.
    pub start_at: i64,
    /// End time, epoch milliseconds.
    pub end_at: i64,
    /// Featured cards, `[]` when none.
    pub pickup_card_ids: Vec<i64>,
}

/// The list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GachaListResponse {
    /// Matches before pagination.
    pub total: usize,
    /// Effective page.
    pub page: usize,
    /// Effective page size.
    pub limit: usize,
    /// The requested page.
    pub gachas: Vec<GachaListItem>,
}

/// A full gacha plus its pickup card ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GachaDetail {
    /// The gacha as it appears in the feed.
    #[serde(flatten)]
    pub gacha: Gacha,
    /// Featured cards, `[]` when none.
    pub pickup_card_ids: Vec<i64>,
}

fn positive_or(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(default)
}

fn pickups_of(generation: &Generation, gacha_id: i64) -> Vec<i64> {
    generation.gacha_pickups.get(&gacha_id).cloned().unwrap_or_default()
}

/// Filters, sorts and paginates the gacha list.
pub fn list_gachas(generation: &Generation, query: &GachaListQuery) -> GachaListResponse {
    let page = positive_or(query.page.as_deref(), 1);
    let limit = positive_or(query.limit.as_deref(), DEFAULT_PAGE_SIZE);
    let search = query.search.as_deref().unwrap_or("").to_lowercase();

    let mut filtered: Vec<&Gacha> = if search.is_empty() {
        generation.gacha_list.iter().collect()
    } else {
        let search_id = search.parse::<i64>().ok();
        generation
            .gacha_list
            .iter()
            .filter(|g| search_id == Some(g.id) || g.name.to_lowercase().contains(&search))
            .collect()
    };

    let by_id = query.sort_by.as_deref() == Some("id");
    let ascending = query.sort_order.as_deref() == Some("asc");
    filtered.sort_by(|a, b| {
        let ordering = if by_id {
            a.id.cmp(&b.id)
        } else {
            a.start_at.cmp(&b.start_at)
        };
        if ascending { ordering } else { ordering.reverse() }
    });

    let total = filtered.len();
    let start = page.saturating_sub(1).saturating_mul(limit).min(total);
    let end = start.saturating_add(limit).min(total);

    let gachas = filtered[start..end]
        .iter()
        .map(|g| GachaListItem {
            id: g.id,
            gacha_type: g.gacha_type.clone(),
            name: g.name.clone(),
            assetbundle_name: g.assetbundle_name.clone(),
            start_at: g.start_at,
            end_at: g.end_at,
            pickup_card_ids: pickups_of(generation, g.id),
        })
        .collect();

    GachaListResponse {
        total,
        page,
        limit,
        gachas,
    }
}

/// Looks up one gacha by id.
///
/// # Errors
/// [`ViewerError::NotFound`] when no gacha has that id.
pub fn gacha_detail(generation: &Generation, id: i64) -> Result<GachaDetail> {
    let gacha = generation
        .gacha_list
        .iter()
        .find(|g| g.id == id)
        .ok_or_else(|| ViewerError::NotFound("Gacha".to_string()))?;

    Ok(GachaDetail {
        gacha: gacha.clone(),
        pickup_card_ids: pickups_of(generation, id),
    })
}
