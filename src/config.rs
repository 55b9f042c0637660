//! Runtime configuration loaded from the environment.
//!
//! Everything the heuristics depend on — the bot signature deny-list, the
//! premature-fetch threshold, the dedup window and retention horizon — is
//! configuration rather than logic, so it can be tuned and tested
//! independently of the pipeline.
//!
//! All values have defaults; the service starts with an empty environment.
//! Alert credentials are the one optional piece: when `RESEND_API_KEY` or
//! `NOTIFY_TO` is unset, alert dispatch becomes a logged no-op.

use std::time::Duration;

/// Default port the HTTP server binds.
const DEFAULT_PORT: u16 = 5000;

/// Default dedup suppression window (10 minutes).
const DEFAULT_DEDUP_WINDOW_SECS: u64 = 600;

/// Default cache retention horizon (1 hour). Must be >= the dedup window.
const DEFAULT_RETENTION_SECS: u64 = 3600;

/// Default interval between cache sweeps.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Default minimum believable open latency after a registered send time.
///
/// Kept well below human reaction scale: this guards against the sending
/// infrastructure fetching the pixel synchronously, not against fast readers.
const DEFAULT_MIN_OPEN_LATENCY_SECS: u64 = 15;

/// Default sender address for alerts.
const DEFAULT_NOTIFY_FROM: &str = "tracker@example.com";

/// Default path of the append-only open log.
const DEFAULT_LOG_PATH: &str = "opens.csv";

/// User-agent substrings of known automated fetchers: mail-provider image
/// proxies, corporate mail-safety scanners, and preview fetchers. Matched
/// case-insensitively.
const DEFAULT_BOT_SIGNATURES: &[&str] = &[
    "googleimageproxy",
    "outlook.office.com",
    "microsoft office",
    "appleimageproxy",
    "thunderbird",
    "protection.outlook.com",
    "mail.ru",
    "yahoo",
    "safe links",
];

/// Credentials and addressing for the alert transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Resend API key (bearer token).
    pub api_key: String,
    /// Address alerts are delivered to.
    pub to: String,
    /// Sender address on outgoing alerts.
    pub from: String,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds on all interfaces.
    pub port: u16,

    /// Suppression window `W`: a repeat of the same dedup key within this
    /// duration is a duplicate, not a new open.
    pub dedup_window: Duration,

    /// Retention horizon `H`: cache entries older than this are swept.
    /// Always >= `dedup_window`.
    pub retention: Duration,

    /// How often the background sweep runs.
    pub sweep_interval: Duration,

    /// Minimum believable latency between a registered send time and an open.
    pub min_open_latency: Duration,

    /// User-agent deny-list, matched as lowercase substrings.
    pub bot_signatures: Vec<String>,

    /// Path of the append-only open log.
    pub log_path: String,

    /// Alert transport credentials; `None` when not configured.
    pub notify: Option<NotifyConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            dedup_window: Duration::from_secs(DEFAULT_DEDUP_WINDOW_SECS),
            retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            min_open_latency: Duration::from_secs(DEFAULT_MIN_OPEN_LATENCY_SECS),
            bot_signatures: DEFAULT_BOT_SIGNATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            log_path: DEFAULT_LOG_PATH.to_string(),
            notify: None,
        }
    }
}

impl Config {
    /// Creates a `Config` from environment variables.
    ///
    /// Reads `BEACON_PORT`, `BEACON_DEDUP_WINDOW_SECS`,
    /// `BEACON_RETENTION_SECS`, `BEACON_SWEEP_INTERVAL_SECS`,
    /// `BEACON_MIN_OPEN_LATENCY_SECS`, `BEACON_BOT_SIGNATURES`
    /// (comma-separated), `BEACON_LOG_PATH`, and the alert credentials
    /// `RESEND_API_KEY` / `NOTIFY_TO` / `NOTIFY_FROM`. Unset or unparsable
    /// values fall back to defaults.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let retention = Duration::from_secs(
            env_u64("BEACON_RETENTION_SECS").unwrap_or(DEFAULT_RETENTION_SECS),
        );
        let dedup_window = Duration::from_secs(
            env_u64("BEACON_DEDUP_WINDOW_SECS").unwrap_or(DEFAULT_DEDUP_WINDOW_SECS),
        );

        let bot_signatures = match std::env::var("BEACON_BOT_SIGNATURES") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => defaults.bot_signatures,
        };

        let notify = match (std::env::var("RESEND_API_KEY"), std::env::var("NOTIFY_TO")) {
            (Ok(api_key), Ok(to)) if !api_key.is_empty() && !to.is_empty() => {
                Some(NotifyConfig {
                    api_key,
                    to,
                    from: std::env::var("NOTIFY_FROM")
                        .unwrap_or_else(|_| DEFAULT_NOTIFY_FROM.to_string()),
                })
            }
            _ => None,
        };

        Config {
            port: std::env::var("BEACON_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            dedup_window,
            // The horizon must cover the window or swept entries could
            // change a duplicate verdict.
            retention: retention.max(dedup_window),
            sweep_interval: Duration::from_secs(
                env_u64("BEACON_SWEEP_INTERVAL_SECS").unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            ),
            min_open_latency: Duration::from_secs(
                env_u64("BEACON_MIN_OPEN_LATENCY_SECS").unwrap_or(DEFAULT_MIN_OPEN_LATENCY_SECS),
            ),
            bot_signatures,
            log_path: std::env::var("BEACON_LOG_PATH").unwrap_or(defaults.log_path),
            notify,
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.dedup_window, Duration::from_secs(600));
        assert_eq!(config.retention, Duration::from_secs(3600));
        assert!(config.retention >= config.dedup_window);
        assert!(config.notify.is_none());
        assert!(
            config
                .bot_signatures
                .iter()
                .any(|s| s == "googleimageproxy")
        );
    }

    #[test]
    fn default_signatures_are_lowercase() {
        // The classifier lowercases the user-agent once and compares
        // directly, so the configured signatures must already be lowercase.
        for sig in Config::default().bot_signatures {
            assert_eq!(sig, sig.to_lowercase());
        }
    }
}
