//! Send-time registration endpoint.
//!
//! The sender calls this right after dispatching a tracked message; the
//! recorded time feeds the premature-fetch guard. Registration is volatile
//! and best-effort: a missing registration only means the guard stays off
//! for that message.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use chrono::Utc;
use tracing::debug;

use super::AppState;
use super::pixel::raw_query_param;
use crate::types::TrackId;

/// Send-time registration handler.
///
/// # Request
///
/// - Method: POST
/// - Query parameter: `id` (track ID; an empty value is recorded as-is)
///
/// # Response
///
/// Always 200 OK. Re-registration overwrites the previous time, so the
/// endpoint is idempotent from the sender's point of view.
pub async fn sent_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> (StatusCode, &'static str) {
    let query = request.uri().query().unwrap_or("");
    let track_id = TrackId::new(raw_query_param(query, "id").trim());
    let now = Utc::now();

    debug!(track_id = %track_id, "Registered send time");
    state.send_times().record(track_id, now);

    (StatusCode::OK, "OK")
}
