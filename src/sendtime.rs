//! Registry of message dispatch times.
//!
//! The sender may report "message X was just sent" via the registration
//! endpoint. The classifier uses that time to recognize fetches arriving
//! implausibly soon after sending, which are the sending infrastructure
//! prefetching the pixel rather than a reader opening the message.
//!
//! Like the dedup cache this is volatile process state: registrations do not
//! survive a restart, and a message with no registration simply gets no
//! premature-fetch protection.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::TrackId;

/// Map from track ID to the time its message was dispatched.
#[derive(Debug)]
pub struct SendTimeRegistry {
    /// How long a registration is kept before being swept.
    retention: chrono::Duration,

    entries: Mutex<HashMap<TrackId, DateTime<Utc>>>,
}

impl SendTimeRegistry {
    pub fn new(retention: Duration) -> Self {
        SendTimeRegistry {
            retention: chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records `now` as the dispatch time of `id`, overwriting any earlier
    /// registration. Re-registration is how a re-send refreshes its guard,
    /// so this is idempotent from the caller's point of view.
    pub fn record(&self, id: TrackId, now: DateTime<Utc>) {
        self.lock().insert(id, now);
    }

    /// Returns the registered dispatch time of `id`, if any.
    pub fn lookup(&self, id: &TrackId) -> Option<DateTime<Utc>> {
        self.lock().get(id).copied()
    }

    /// Removes registrations older than the retention horizon. Returns how
    /// many were purged.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, sent_at| now.signed_duration_since(*sent_at) < self.retention);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TrackId, DateTime<Utc>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
