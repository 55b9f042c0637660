//! Traffic classification: suppress fetches that are not genuine human opens.
//!
//! Two independent heuristics run before an event reaches the dedup cache:
//!
//! - **Signature match**: mail-provider image proxies, corporate mail
//!   scanners, and preview fetchers announce themselves in the user-agent.
//!   The deny-list is injected configuration, matched as lowercase
//!   substrings.
//! - **Premature-fetch guard**: a fetch observed within seconds of the
//!   message's registered send time is the sending infrastructure prefetching
//!   the pixel, not a reader. The threshold stays well below human reaction
//!   time so genuine fast opens are never suppressed.
//!
//! Suppression is not an error: the caller still receives the pixel, the
//! event just never reaches the cache or the dispatcher.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::OpenEvent;

/// Why an event was suppressed before the dedup check.
///
/// Carried for observability only; every reason terminates the pipeline the
/// same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressReason {
    /// The user-agent matched a deny-list signature.
    BotSignature(String),

    /// The fetch arrived sooner after the registered send time than any
    /// human could plausibly open the message.
    PrematureFetch,
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppressReason::BotSignature(sig) => write!(f, "bot signature `{sig}`"),
            SuppressReason::PrematureFetch => write!(f, "premature fetch"),
        }
    }
}

/// The classifier with its injected heuristics.
#[derive(Debug, Clone)]
pub struct Classifier {
    /// Deny-list signatures, held lowercase.
    signatures: Vec<String>,

    /// Minimum believable latency between send time and open.
    min_open_latency: Duration,
}

impl Classifier {
    /// Creates a classifier from a signature deny-list and a premature-fetch
    /// threshold. Signatures are lowercased once here so the per-request
    /// check only lowercases the user-agent.
    pub fn new(
        signatures: impl IntoIterator<Item = impl Into<String>>,
        min_open_latency: Duration,
    ) -> Self {
        Classifier {
            signatures: signatures
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
            min_open_latency,
        }
    }

    /// Classifies an event, given the registered send time of its message
    /// (when known). Returns `Some(reason)` when the event should be
    /// suppressed, `None` when it may proceed to the dedup check.
    pub fn classify(
        &self,
        event: &OpenEvent,
        send_time: Option<DateTime<Utc>>,
    ) -> Option<SuppressReason> {
        if let Some(sig) = self.match_signature(&event.user_agent) {
            return Some(SuppressReason::BotSignature(sig.to_string()));
        }

        if let Some(sent_at) = send_time {
            let elapsed = event.observed_at.signed_duration_since(sent_at);
            if elapsed < chrono::Duration::from_std(self.min_open_latency).unwrap_or_default() {
                return Some(SuppressReason::PrematureFetch);
            }
        }

        None
    }

    /// Returns the first deny-list signature contained in the user-agent,
    /// case-insensitively.
    fn match_signature(&self, user_agent: &str) -> Option<&str> {
        let ua = user_agent.to_lowercase();
        self.signatures
            .iter()
            .find(|sig| ua.contains(sig.as_str()))
            .map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::decode::{RawParams, decode_event};

    fn classifier() -> Classifier {
        let config = Config::default();
        Classifier::new(config.bot_signatures, config.min_open_latency)
    }

    fn event(user_agent: &str, observed_at: DateTime<Utc>) -> OpenEvent {
        decode_event(
            RawParams {
                id: "abc123".to_string(),
                user_agent: user_agent.to_string(),
                ..RawParams::default()
            },
            observed_at,
        )
    }

    #[test]
    fn ordinary_browser_passes() {
        let now = Utc::now();
        let verdict = classifier().classify(
            &event("Mozilla/5.0 (X11; Linux x86_64) Firefox/131.0", now),
            None,
        );
        assert_eq!(verdict, None);
    }

    #[test]
    fn signature_match_is_case_insensitive_substring() {
        let now = Utc::now();
        let verdict = classifier().classify(&event("Mozilla/5.0 GoogleImageProxy", now), None);
        assert_eq!(
            verdict,
            Some(SuppressReason::BotSignature("googleimageproxy".to_string()))
        );

        let verdict = classifier().classify(
            &event("YAHOO! Slurp embedded fetcher", now),
            None,
        );
        assert!(matches!(verdict, Some(SuppressReason::BotSignature(_))));
    }

    #[test]
    fn premature_fetch_below_threshold_is_suppressed() {
        let sent_at = Utc::now();
        let observed = sent_at + chrono::Duration::seconds(3);
        let verdict = classifier().classify(&event("Mozilla/5.0", observed), Some(sent_at));
        assert_eq!(verdict, Some(SuppressReason::PrematureFetch));
    }

    #[test]
    fn open_at_threshold_is_accepted() {
        let sent_at = Utc::now();
        let observed = sent_at + chrono::Duration::seconds(15);
        let verdict = classifier().classify(&event("Mozilla/5.0", observed), Some(sent_at));
        assert_eq!(verdict, None);
    }

    #[test]
    fn unknown_send_time_disables_the_guard() {
        // Without a registered send time there is nothing to measure against.
        let now = Utc::now();
        let verdict = classifier().classify(&event("Mozilla/5.0", now), None);
        assert_eq!(verdict, None);
    }

    #[test]
    fn signatures_are_lowercased_at_construction() {
        let classifier = Classifier::new(["WeIrDBot"], Duration::from_secs(15));
        let verdict = classifier.classify(&event("prefix weirdbot suffix", Utc::now()), None);
        assert!(matches!(verdict, Some(SuppressReason::BotSignature(_))));
    }
}
