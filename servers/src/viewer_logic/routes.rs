//! The HTTP surface.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use lib_common::ViewerError;
use lib_common::bilibili::ProxiedResponse;
use lib_common::masterdata::{GachaListQuery, gacha_detail, list_gachas};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use super::error::AppError;
use super::state::AppState;
use super::static_files::serve_static;

const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000";

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/card-event-map", get(card_event_map))
        .route("/api/music-event-map", get(music_event_map))
        .route("/api/card-gacha-map", get(card_gacha_map))
        .route("/api/event-virtuallive-map", get(event_virtual_live_map))
        .route("/api/virtuallive-event-map", get(virtual_live_event_map))
        .route("/api/card-costume3d-map", get(card_costume3d_map))
        .route("/api/costume3d-group-id-map", get(costume3d_group_id_map))
        .route("/api/costume3d-group-map", get(costume3d_group_map))
        .route("/api/gachas", get(gachas))
        .route("/api/gachas/{id}", get(gacha))
        .route("/api/bilibili/dynamic/", get(dynamic_without_uid))
        .route("/api/bilibili/dynamic/{uid}", get(dynamic))
        .route("/api/bilibili/image", get(image))
        .route("/api/status", get(status))
        .fallback(serve_static)
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

fn json_of<T: Serialize>(value: &T) -> Response {
    Json(value).into_response()
}

async fn card_event_map(State(state): State<AppState>) -> Response {
    json_of(&*state.store.card_event_map().await)
}

async fn music_event_map(State(state): State<AppState>) -> Response {
    json_of(&*state.store.music_event_map().await)
}

async fn card_gacha_map(State(state): State<AppState>) -> Response {
    json_of(&*state.store.card_gacha_map().await)
}

async fn event_virtual_live_map(State(state): State<AppState>) -> Response {
    json_of(&*state.store.event_virtual_live_map().await)
}

async fn virtual_live_event_map(State(state): State<AppState>) -> Response {
    json_of(&*state.store.virtual_live_event_map().await)
}

async fn card_costume3d_map(State(state): State<AppState>) -> Response {
    json_of(&*state.store.card_costume3d_map().await)
}

async fn costume3d_group_id_map(State(state): State<AppState>) -> Response {
    json_of(&*state.store.costume3d_group_id_map().await)
}

async fn costume3d_group_map(State(state): State<AppState>) -> Response {
    json_of(&*state.store.costume3d_group_map().await)
}

async fn gachas(State(state): State<AppState>, Query(query): Query<GachaListQuery>) -> Response {
    let generation = state.store.snapshot().await;
    json_of(&list_gachas(&generation, &query))
}

async fn gacha(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, AppError> {
    let id = id
        .parse::<i64>()
        .map_err(|_| ViewerError::NotFound("Gacha".to_string()))?;
    let generation = state.store.snapshot().await;
    Ok(json_of(&gacha_detail(&generation, id)?))
}

async fn status(State(state): State<AppState>) -> Response {
    json_of(&state.store.stats().await)
}

fn proxied(resp: ProxiedResponse) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut out = (status, resp.body).into_response();
    let headers = out.headers_mut();
    match resp.content_type.as_deref().map(HeaderValue::from_str) {
        Some(Ok(ct)) => {
            headers.insert(header::CONTENT_TYPE, ct);
        }
        _ => {
            headers.remove(header::CONTENT_TYPE);
        }
    }
    out
}

async fn dynamic_without_uid() -> AppError {
    AppError(ViewerError::BadRequest("Empty UID".to_string()))
}

async fn dynamic(State(state): State<AppState>, Path(uid): Path<String>) -> Result<Response, AppError> {
    let resp = state.bilibili.dynamic_feed(uid.trim()).await?;
    Ok(proxied(resp))
}

#[derive(Debug, Deserialize)]
struct ImageQuery {
    url: Option<String>,
}

async fn image(State(state): State<AppState>, Query(query): Query<ImageQuery>) -> Result<Response, AppError> {
    let url = query.url.unwrap_or_default();
    let resp = state.bilibili.image(&url).await?;
    let cache = resp.cache;

    let mut out = proxied(resp);
    let headers = out.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(IMAGE_CACHE_CONTROL));
    headers.insert("x-cache", HeaderValue::from_static(cache.as_str()));
    Ok(out)
}
