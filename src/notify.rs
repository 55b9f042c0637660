//! Out-of-band alerting for accepted opens.
//!
//! One alert email per accepted event, dispatched fire-and-forget: the
//! request path spawns the send and never waits on it, so transport latency
//! is invisible to the pixel fetch. Transport failures are logged at the
//! spawned task's own boundary because nothing downstream observes them.
//!
//! The transport sits behind the [`AlertTransport`] trait so tests can
//! substitute a mock; production uses [`ResendTransport`], which posts to
//! the Resend HTTP API.

use std::fmt;
use std::future::Future;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::NotifyConfig;
use crate::types::OpenEvent;

/// Resend API endpoint for sending email.
const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Timestamp format used in the alert body.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A formatted alert, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Subject line of the alert email.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Formats the alert for an accepted event.
///
/// Absent fields get explicit placeholders rather than empty lines, so the
/// recipient of the alert can tell "missing" from "blank".
pub fn format_alert(event: &OpenEvent) -> Alert {
    let subject_display = if event.subject.is_empty() {
        "(no subject)"
    } else {
        &event.subject
    };
    let track_display = if event.track_id.is_empty() {
        "(none)"
    } else {
        event.track_id.as_str()
    };
    let recipient_display = if event.recipient.is_empty() {
        "(unknown)"
    } else {
        &event.recipient
    };

    let body = format!(
        "Tracked message opened!\n\n\
         Track ID: {track_display}\n\
         Subject: {subject_display}\n\
         Recipient: {recipient_display}\n\
         Nonce: {nonce}\n\
         IP: {ip}\n\
         User-Agent: {ua}\n\
         Opened at: {at} UTC\n",
        nonce = event.nonce,
        ip = event.source_ip,
        ua = event.user_agent,
        at = event.observed_at.format(TIME_FORMAT),
    );

    let subject = format!(
        "Read Alert: {}",
        if event.subject.is_empty() {
            "No Subject"
        } else {
            &event.subject
        }
    );

    Alert { subject, body }
}

/// Sends a formatted alert over some channel.
///
/// Implementations must be cheap to clone: the dispatcher clones the
/// transport into each spawned send task.
///
/// # Example (mock for testing)
///
/// ```ignore
/// #[derive(Clone)]
/// struct RecordingTransport {
///     sent: mpsc::UnboundedSender<Alert>,
/// }
///
/// impl AlertTransport for RecordingTransport {
///     type Error = Infallible;
///
///     async fn send(&self, alert: Alert) -> Result<(), Self::Error> {
///         let _ = self.sent.send(alert);
///         Ok(())
///     }
/// }
/// ```
pub trait AlertTransport {
    /// The error type returned by this transport.
    type Error: fmt::Display;

    /// Deliver one alert.
    fn send(&self, alert: Alert) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Errors returned by the Resend transport.
#[derive(Debug, Error)]
pub enum ResendError {
    /// The HTTP request itself failed (connect, TLS, timeout).
    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resend answered with a non-success status.
    #[error("Resend API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Alert transport backed by the Resend email API.
#[derive(Debug, Clone)]
pub struct ResendTransport {
    client: reqwest::Client,
    config: NotifyConfig,
    api_url: String,
}

impl ResendTransport {
    pub fn new(config: NotifyConfig) -> Self {
        ResendTransport {
            client: reqwest::Client::new(),
            config,
            api_url: RESEND_API_URL.to_string(),
        }
    }
}

impl AlertTransport for ResendTransport {
    type Error = ResendError;

    async fn send(&self, alert: Alert) -> Result<(), Self::Error> {
        let payload = serde_json::json!({
            "from": self.config.from,
            "to": [self.config.to],
            "subject": alert.subject,
            "text": alert.body,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ResendError::Api { status, body })
        }
    }
}

/// The notification dispatcher.
///
/// Holds the configured transport, or `None` when credentials were absent at
/// startup — a configuration gap, not an error: dispatch then logs and
/// no-ops.
#[derive(Debug, Clone)]
pub struct Notifier<T> {
    transport: Option<T>,
}

impl<T> Notifier<T>
where
    T: AlertTransport + Clone + Send + Sync + 'static,
    T::Error: Send,
{
    pub fn new(transport: Option<T>) -> Self {
        Notifier { transport }
    }

    /// Whether a transport is configured.
    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    /// Dispatches the alert for an accepted event.
    ///
    /// Fire-and-forget: the send runs on its own task with no join handle
    /// and no timeout. A hung transport ties up one background task, never
    /// the request that triggered it.
    pub fn dispatch(&self, event: &OpenEvent) {
        let Some(transport) = self.transport.clone() else {
            warn!(
                track_id = %event.track_id,
                "Alert credentials not configured; skipping alert"
            );
            return;
        };

        let alert = format_alert(event);
        let track_id = event.track_id.clone();

        tokio::spawn(async move {
            debug!(track_id = %track_id, "Sending open alert");
            match transport.send(alert).await {
                Ok(()) => {
                    info!(track_id = %track_id, "Open alert sent");
                }
                Err(e) => {
                    warn!(track_id = %track_id, error = %e, "Open alert failed");
                }
            }
        });
    }
}
