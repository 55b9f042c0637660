//! The per-request open event.

use chrono::{DateTime, Utc};

use super::ids::{DedupKey, Nonce, TrackId};

/// One fetch of the tracking pixel, interpreted as a candidate
/// "message opened" signal.
///
/// Reconstructed from request parameters on every fetch and never persisted
/// by the core itself; the open log keeps the durable record for accepted
/// events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenEvent {
    /// Token identifying the originating message; may be empty.
    pub track_id: TrackId,

    /// Subject line as transported (base64url). Kept for the open log.
    pub subject_b64: String,

    /// Best-effort decoded subject; empty when decoding failed.
    pub subject: String,

    /// Percent-decoded destination address.
    pub recipient: String,

    /// Per-render cache-buster, or the shared sentinel when absent.
    pub nonce: Nonce,

    /// User-Agent header of the fetch.
    pub user_agent: String,

    /// Client IP: forwarded-for header when present, else the peer address.
    pub source_ip: String,

    /// When the fetch was received.
    pub observed_at: DateTime<Utc>,
}

impl OpenEvent {
    /// Returns the key under which this event is deduplicated.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::derive(&self.track_id, &self.nonce)
    }
}
