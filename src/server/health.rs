//! Health check endpoints for liveness probes.
//!
//! Returns 200 OK if the server is running. The root endpoint serves a
//! human-readable confirmation string, which doubles as a keep-awake target
//! for uptime pingers on hosts that sleep idle services.

use axum::http::StatusCode;

/// Health check handler.
///
/// Returns 200 OK with the text "OK". This simple endpoint is used to
/// verify that the server is running and accepting connections.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Root handler: static confirmation string, no state.
pub async fn root_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "Tracker up and running!")
}
