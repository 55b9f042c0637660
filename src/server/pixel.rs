//! Tracking pixel endpoint.
//!
//! The externally observable contract is deliberately boring: every request,
//! no matter how malformed and no matter which pipeline branch it takes,
//! gets the same 1×1 transparent PNG with caching disabled. Suppression and
//! deduplication must be invisible to the fetching client, both so mail
//! clients keep rendering the image and so scanners cannot probe which
//! fetches were counted.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, header};
use axum::response::IntoResponse;
use chrono::Utc;

use super::AppState;
use crate::decode::{RawParams, decode_event};

/// The 1×1 transparent PNG served on every request.
pub(crate) const PIXEL: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, //
    0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00, 0x01, //
    0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x1F, 0x15, //
    0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, //
    0x78, 0x9C, 0x63, 0x60, 0x00, 0x00, 0x02, 0x00, 0x01, 0x00, //
    0x05, 0xFE, 0x02, 0xFE, 0xA7, 0xB1, 0x08, 0xB9, 0x00, 0x00, //
    0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Cache-defeating headers sent with every pixel response.
const CACHE_CONTROL: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// Tracking pixel handler.
///
/// # Request
///
/// - Method: GET
/// - Query parameters (all optional): `id` (track ID), `s` (base64url
///   subject, padding-tolerant), `to` (percent-encoded recipient), `cb`
///   (cache-buster)
/// - Headers: `User-Agent`, `X-Forwarded-For` (first entry wins; falls back
///   to the peer address)
///
/// # Response
///
/// Always 200 OK with the pixel and no-cache headers. This handler is
/// infallible by construction: decoding degrades instead of erroring and
/// the pipeline catches its collaborators' faults internally.
pub async fn pixel_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> impl IntoResponse {
    let now = Utc::now();
    let query = request.uri().query().unwrap_or("");

    let params = RawParams {
        id: raw_query_param(query, "id"),
        subject_b64: raw_query_param(query, "s"),
        to: raw_query_param(query, "to"),
        cb: raw_query_param(query, "cb"),
        user_agent: header_str(request.headers(), header::USER_AGENT.as_str()),
        source_ip: client_ip(request.headers(), request.extensions()),
    };

    let event = decode_event(params, now);
    state.pipeline().handle(event);

    pixel_response()
}

/// The fixed pixel response, shared by every branch.
pub(crate) fn pixel_response() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, CACHE_CONTROL),
            (header::PRAGMA, "no-cache"),
        ],
        PIXEL,
    )
}

/// Returns the raw (still percent-encoded) value of a query parameter, or
/// the empty string when absent. First occurrence wins.
pub(crate) fn raw_query_param(query: &str, name: &str) -> String {
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then(|| value.to_string())
        })
        .next()
        .unwrap_or_default()
}

/// Returns a header value as a string, or the empty string.
fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Determines the client IP: the first `X-Forwarded-For` entry when present,
/// else the peer address recorded at accept time, else `"unknown"`.
fn client_ip(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}
