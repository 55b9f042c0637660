//! Identity decoding: raw request parameters to an [`OpenEvent`].
//!
//! Decoding is strictly best-effort. A tracking pixel is fetched by mail
//! clients that mangle URLs in every way imaginable, so no malformed field
//! may ever surface as an error: bad base64 degrades to an empty subject,
//! bad percent-encoding degrades lossily, missing parameters become empty
//! strings.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;

use crate::types::{Nonce, OpenEvent, TrackId};

/// Raw string parameters as they arrived on the request, before any
/// decoding. Missing parameters are represented as empty strings.
#[derive(Debug, Clone, Default)]
pub struct RawParams {
    /// `id` query parameter.
    pub id: String,
    /// `s` query parameter (base64url-encoded subject).
    pub subject_b64: String,
    /// `to` query parameter (percent-encoded recipient).
    pub to: String,
    /// `cb` query parameter (cache-buster).
    pub cb: String,
    /// User-Agent header.
    pub user_agent: String,
    /// Forwarded-for header value, or the peer address as a fallback.
    pub source_ip: String,
}

/// Decodes the raw parameters into an [`OpenEvent`] observed at `now`.
pub fn decode_event(params: RawParams, now: DateTime<Utc>) -> OpenEvent {
    let subject_b64 = params.subject_b64.trim().to_string();
    OpenEvent {
        track_id: TrackId::new(params.id.trim()),
        subject: decode_subject(&subject_b64),
        subject_b64,
        recipient: decode_recipient(params.to.trim()),
        nonce: Nonce::from_param(params.cb.trim()),
        user_agent: params.user_agent,
        source_ip: params.source_ip,
        observed_at: now,
    }
}

/// Decodes a base64url subject, tolerating missing padding.
///
/// Senders routinely strip the trailing `=` to keep URLs short, so padding
/// is removed before decoding. Any decode failure yields the empty string;
/// invalid UTF-8 in the decoded bytes degrades lossily.
pub fn decode_subject(subject_b64: &str) -> String {
    if subject_b64.is_empty() {
        return String::new();
    }

    match URL_SAFE_NO_PAD.decode(subject_b64.trim_end_matches('=')) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

/// Percent-decodes a recipient address, lossily for invalid UTF-8.
pub fn decode_recipient(to: &str) -> String {
    percent_decode_str(to).decode_utf8_lossy().into_owned()
}
