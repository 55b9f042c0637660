//! Per-request orchestration: decode → classify → dedup → log → dispatch.
//!
//! Every request terminates in exactly one outcome, and every outcome
//! produces the same pixel response upstream. The pipeline owns the ordering
//! invariant: an alert is only ever dispatched after the dedup cache
//! accepted the same event, and both the log append and the dispatch happen
//! off the response path.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::classify::{Classifier, SuppressReason};
use crate::dedup::DedupCache;
use crate::log::OpenLog;
use crate::notify::{AlertTransport, Notifier};
use crate::sendtime::SendTimeRegistry;
use crate::types::OpenEvent;

/// Terminal state of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The classifier recognized non-human traffic; nothing recorded.
    SuppressedByClassifier(SuppressReason),

    /// The dedup cache saw this key within the suppression window.
    Duplicate,

    /// A novel open: logged and alerted.
    Accepted,
}

/// The event pipeline, shared across all request handlers.
#[derive(Debug, Clone)]
pub struct Pipeline<T> {
    classifier: Classifier,
    send_times: Arc<SendTimeRegistry>,
    cache: Arc<DedupCache>,
    log: Option<Arc<OpenLog>>,
    notifier: Notifier<T>,
}

impl<T> Pipeline<T>
where
    T: AlertTransport + Clone + Send + Sync + 'static,
    T::Error: Send,
{
    pub fn new(
        classifier: Classifier,
        send_times: Arc<SendTimeRegistry>,
        cache: Arc<DedupCache>,
        log: Option<Arc<OpenLog>>,
        notifier: Notifier<T>,
    ) -> Self {
        Pipeline {
            classifier,
            send_times,
            cache,
            log,
            notifier,
        }
    }

    /// Registry used by the premature-fetch guard and the registration
    /// endpoint.
    pub fn send_times(&self) -> &Arc<SendTimeRegistry> {
        &self.send_times
    }

    /// Runs a decoded event through classification, dedup, logging, and
    /// dispatch. Infallible: every internal fault degrades to a logged
    /// warning and the outcome still tells the handler to serve the pixel.
    pub fn handle(&self, event: OpenEvent) -> Outcome {
        let send_time = self.send_times.lookup(&event.track_id);

        if let Some(reason) = self.classifier.classify(&event, send_time) {
            info!(
                track_id = %event.track_id,
                user_agent = %event.user_agent,
                reason = %reason,
                "Suppressed by classifier"
            );
            return Outcome::SuppressedByClassifier(reason);
        }

        let key = event.dedup_key();
        if !self.cache.accept_or_suppress(&key, event.observed_at) {
            debug!(key = %key, "Suppressed duplicate open");
            return Outcome::Duplicate;
        }

        info!(
            track_id = %event.track_id,
            recipient = %event.recipient,
            ip = %event.source_ip,
            "Open accepted"
        );

        // Both side effects are handed off; the response never waits on
        // either, and neither failure reaches the caller.
        if let Some(log) = self.log.clone() {
            let event_for_log = event.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(e) = log.append(&event_for_log) {
                    warn!(error = %e, "Failed to append to open log");
                }
            });
        }

        self.notifier.dispatch(&event);

        Outcome::Accepted
    }
}
