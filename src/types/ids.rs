//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different identifier strings
//! (e.g., using a nonce where a track ID is expected) and make the code more
//! self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The opaque token identifying the originating message.
///
/// Assigned by whatever composed the tracked message; the tracker treats it
/// as an uninterpreted string. May be empty when the sender omitted it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(s: impl Into<String>) -> Self {
        TrackId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        TrackId(s)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        TrackId(s.to_string())
    }
}

/// The per-render cache-buster attached to a pixel URL.
///
/// Distinguishes separate renders of the same message (e.g., a forward or a
/// re-send). Events without one share the fixed [`Nonce::NONE`] sentinel, so
/// they all map to the same dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    /// Sentinel value used when the pixel URL carried no cache-buster.
    pub const NONE: &'static str = "none";

    /// Creates a nonce from a raw parameter value, mapping the empty string
    /// to the shared sentinel.
    pub fn from_param(s: &str) -> Self {
        if s.is_empty() {
            Nonce(Self::NONE.to_string())
        } else {
            Nonce(s.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the shared sentinel rather than a real cache-buster.
    pub fn is_sentinel(&self) -> bool {
        self.0 == Self::NONE
    }
}

impl Default for Nonce {
    fn default() -> Self {
        Nonce(Self::NONE.to_string())
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The composite key under which repeat fetches of the same logical open are
/// recognized.
///
/// Derived deterministically as `<track_id>:<nonce>`. Two events with the
/// same key observed within the suppression window are one logical open.
///
/// When both the track ID and the nonce are absent, every such event
/// collapses onto the single key `:none` and they mutually suppress each
/// other. This mirrors the original behavior and is deliberate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    /// Derives the key for a track ID / nonce pair.
    pub fn derive(track_id: &TrackId, nonce: &Nonce) -> Self {
        DedupKey(format!("{}:{}", track_id.as_str(), nonce.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
