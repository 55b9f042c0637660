//! Duplicate suppression for open events.
//!
//! The cache maps a dedup key to the time an event under that key was last
//! accepted. A repeat of the same key within the suppression window is one
//! logical open and must not alert again.
//!
//! # Refresh discipline
//!
//! A suppressed duplicate never refreshes the stored timestamp. Refreshing
//! would let a bot re-fetching every few minutes extend the suppression
//! window forever; measuring the window from the last *accepted* event bounds
//! how long a genuine re-open stays invisible.
//!
//! # Expiry
//!
//! Entries older than the retention horizon are purged by a periodic sweep
//! (see [`run_sweeper`]). Correctness does not depend on sweep timing: the
//! horizon is at least the window, so any entry old enough to be swept
//! would accept on lookup anyway. The sweep only bounds memory.
//!
//! # Volatility
//!
//! The cache lives in process memory only. A restart clears dedup history
//! and send-time registrations; the worst consequence is one extra alert per
//! recently opened message. This is a documented limitation, not a defect.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::sendtime::SendTimeRegistry;
use crate::types::DedupKey;

/// Bounded-lifetime map from dedup key to last-accepted time.
///
/// Shared by every request handler; all access goes through a single mutex
/// so that two concurrent requests bearing the same key can never both
/// observe "accepted".
#[derive(Debug)]
pub struct DedupCache {
    /// Suppression window `W`.
    window: chrono::Duration,

    /// Retention horizon `H`, >= `window`.
    retention: chrono::Duration,

    /// Key -> time of last *accepted* event.
    entries: Mutex<HashMap<DedupKey, DateTime<Utc>>>,
}

impl DedupCache {
    /// Creates a cache with the given suppression window and retention
    /// horizon. The horizon is clamped up to the window so that sweeping can
    /// never remove an entry that would still produce a duplicate verdict.
    pub fn new(window: Duration, retention: Duration) -> Self {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let retention = chrono::Duration::from_std(retention)
            .unwrap_or(chrono::Duration::MAX)
            .max(window);

        DedupCache {
            window,
            retention,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Decides whether an event observed at `now` under `key` is novel.
    ///
    /// Returns `true` (accepted) when the key is absent or its last-accepted
    /// time is at least the suppression window in the past; the entry is
    /// then recorded or refreshed. Returns `false` (duplicate) otherwise,
    /// leaving the stored timestamp untouched.
    ///
    /// The read-modify-write runs under one lock acquisition.
    pub fn accept_or_suppress(&self, key: &DedupKey, now: DateTime<Utc>) -> bool {
        let mut entries = self.lock();

        if let Some(last_accepted) = entries.get(key) {
            if now.signed_duration_since(*last_accepted) < self.window {
                return false;
            }
        }

        entries.insert(key.clone(), now);
        true
    }

    /// Removes entries whose last-accepted time is older than the retention
    /// horizon. Returns how many were purged.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, last_accepted| now.signed_duration_since(*last_accepted) < self.retention);
        before - entries.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DedupKey, DateTime<Utc>>> {
        // A panic while holding the lock poisons it; the map itself is
        // always in a consistent state, so recover the guard.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Periodic sweep of the dedup cache and the send-time registry.
///
/// Runs until the cancellation token fires. Uses the same locking discipline
/// as the request path (each sweep is one lock acquisition per store), so a
/// sweep can delay a request by at most one `retain` pass.
pub async fn run_sweeper(
    cache: std::sync::Arc<DedupCache>,
    send_times: std::sync::Arc<SendTimeRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; skip it so startup does no work.
    ticker.tick().await;

    info!(interval_secs = interval.as_secs(), "Cache sweeper started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                let purged = cache.sweep(now);
                let stale_sends = send_times.sweep(now);
                debug!(
                    purged,
                    stale_sends,
                    live = cache.len(),
                    "Swept dedup cache"
                );
            }
            _ = cancel.cancelled() => {
                info!("Cache sweeper shutting down");
                return;
            }
        }
    }
}
