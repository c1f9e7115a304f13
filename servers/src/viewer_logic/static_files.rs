//! Frontend fallback: every path the API routes do not claim.
//!
//! Lookup order for `/a/b`:
//! 1. the file `a/b`, or `a/b/index.html` when `a/b` is a directory;
//! 2. `a/b.html`, so extensionless links reach exported pages;
//! 3. `404.html` with status 404, or a bare 404 when that file is absent.
//!
//! Path decoding and traversal checks are left to `ServeDir`.

use std::path::Path;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

use super::state::AppState;

pub const NO_FRONTEND_BANNER: &str = "Snowy Viewer Backend API Service Running (Static files not found)";

pub async fn serve_static(State(state): State<AppState>, req: Request) -> Response {
    match state.static_dir.as_deref() {
        Some(root) => serve_from(root, req.method().clone(), req.uri().clone(), req.headers().clone()).await,
        None if req.uri().path() == "/" => NO_FRONTEND_BANNER.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn rebuild(method: &Method, uri: Uri, headers: &HeaderMap) -> Request {
    let mut req = Request::new(Body::empty());
    *req.method_mut() = method.clone();
    *req.uri_mut() = uri;
    *req.headers_mut() = headers.clone();
    req
}

async fn try_dir(root: &Path, req: Request) -> Response {
    match ServeDir::new(root).append_index_html_on_directories(true).oneshot(req).await {
        Ok(resp) => resp.map(Body::new),
        Err(never) => match never {},
    }
}

fn with_html_suffix(uri: &Uri) -> Option<Uri> {
    let path = uri.path();
    if path.ends_with('/') {
        return None;
    }
    let rewritten = match uri.query() {
        Some(q) => format!("{path}.html?{q}"),
        None => format!("{path}.html"),
    };
    rewritten.parse().ok()
}

async fn serve_from(root: &Path, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    let resp = try_dir(root, rebuild(&method, uri.clone(), &headers)).await;
    if resp.status() != StatusCode::NOT_FOUND {
        return resp;
    }

    if let Some(html_uri) = with_html_suffix(&uri) {
        let resp = try_dir(root, rebuild(&method, html_uri, &headers)).await;
        if resp.status() != StatusCode::NOT_FOUND {
            return resp;
        }
    }

    not_found_page(root, rebuild(&method, uri, &headers)).await
}

async fn not_found_page(root: &Path, req: Request) -> Response {
    let resp = match ServeFile::new(root.join("404.html")).oneshot(req).await {
        Ok(resp) => resp.map(Body::new),
        Err(never) => match never {},
    };
    if resp.status().is_success() {
        let mut resp = resp;
        *resp.status_mut() = StatusCode::NOT_FOUND;
        resp
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}
