//! HTTP server for the open tracker.
//!
//! This module implements the HTTP server that:
//! - Serves the tracking pixel and runs each fetch through the event pipeline
//! - Accepts send-time registrations for the premature-fetch guard
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `GET /px.png` - Tracking pixel fetch (always returns the pixel)
//! - `POST /sent` - Registers the dispatch time of a message
//! - `GET /health` - Returns 200 if the server is running
//! - `GET /` - Static confirmation string (uptime-pinger friendly)

use std::sync::Arc;

use tracing::warn;

pub mod health;
pub mod pixel;
pub mod sent;

pub use health::{health_handler, root_handler};
pub use pixel::pixel_handler;
pub use sent::sent_handler;

use crate::classify::Classifier;
use crate::config::Config;
use crate::dedup::DedupCache;
use crate::log::OpenLog;
use crate::notify::{Notifier, ResendTransport};
use crate::pipeline::Pipeline;
use crate::sendtime::SendTimeRegistry;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor. It owns the
/// pipeline and the two volatile stores (dedup cache and send-time
/// registry); everything is dropped together on shutdown, and none of it
/// survives a restart.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pipeline: Pipeline<ResendTransport>,
    cache: Arc<DedupCache>,
    send_times: Arc<SendTimeRegistry>,
}

impl AppState {
    /// Creates the application state from configuration.
    ///
    /// A failure to open the open log is downgraded to a warning: the
    /// service runs without a durable log rather than refusing to start.
    pub fn new(config: &Config) -> Self {
        let cache = Arc::new(DedupCache::new(config.dedup_window, config.retention));
        let send_times = Arc::new(SendTimeRegistry::new(config.retention));

        let log = match OpenLog::open(&config.log_path) {
            Ok(log) => Some(Arc::new(log)),
            Err(e) => {
                warn!(path = %config.log_path, error = %e, "Could not open the open log; continuing without it");
                None
            }
        };

        let notifier = Notifier::new(config.notify.clone().map(ResendTransport::new));
        if !notifier.is_configured() {
            warn!("RESEND_API_KEY / NOTIFY_TO not set; open alerts are disabled");
        }

        let pipeline = Pipeline::new(
            Classifier::new(config.bot_signatures.clone(), config.min_open_latency),
            send_times.clone(),
            cache.clone(),
            log,
            notifier,
        );

        AppState {
            inner: Arc::new(AppStateInner {
                pipeline,
                cache,
                send_times,
            }),
        }
    }

    /// Returns the event pipeline.
    pub fn pipeline(&self) -> &Pipeline<ResendTransport> {
        &self.inner.pipeline
    }

    /// Returns the dedup cache (shared with the background sweeper).
    pub fn cache(&self) -> &Arc<DedupCache> {
        &self.inner.cache
    }

    /// Returns the send-time registry (shared with the background sweeper).
    pub fn send_times(&self) -> &Arc<SendTimeRegistry> {
        &self.inner.send_times
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/px.png", get(pixel_handler))
        .route("/sent", post(sent_handler))
        .route("/health", get(health_handler))
        .route("/", get(root_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::server::pixel::PIXEL;

    /// State with a temp-dir open log and no alert transport configured.
    fn test_app_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            log_path: dir
                .path()
                .join("opens.csv")
                .to_string_lossy()
                .into_owned(),
            ..Config::default()
        };
        (AppState::new(&config), dir)
    }

    fn pixel_request(query: &str, user_agent: &str) -> Request<Body> {
        Request::builder()
            .uri(format!("/px.png{query}"))
            .header(header::USER_AGENT, user_agent)
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap()
    }

    async fn assert_pixel_response(response: axum::response::Response) {
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store, no-cache, must-revalidate, max-age=0"
        );
        assert_eq!(response.headers().get(header::PRAGMA).unwrap(), "no-cache");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], PIXEL);
    }

    // ─── Pixel endpoint tests ───

    #[tokio::test]
    async fn accepted_open_returns_pixel() {
        let (state, dir) = test_app_state();
        let app = build_router(state);

        let response = app
            .oneshot(pixel_request(
                "?id=abc123&s=SGVsbG8&to=a%40b.com",
                "Mozilla/5.0 (X11; Linux x86_64) Firefox/131.0",
            ))
            .await
            .unwrap();
        assert_pixel_response(response).await;

        // The accepted open lands in the log (append is fire-and-forget).
        let log_path = dir.path().join("opens.csv");
        let mut logged = false;
        for _ in 0..100 {
            let contents = std::fs::read_to_string(&log_path).unwrap_or_default();
            if contents.contains("abc123") {
                logged = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(logged, "accepted open should be appended to the log");
    }

    #[tokio::test]
    async fn missing_params_still_return_pixel() {
        let (state, _dir) = test_app_state();
        let app = build_router(state);

        let response = app.oneshot(pixel_request("", "Mozilla/5.0")).await.unwrap();
        assert_pixel_response(response).await;
    }

    #[tokio::test]
    async fn malformed_params_still_return_pixel() {
        let (state, _dir) = test_app_state();
        let app = build_router(state);

        let response = app
            .oneshot(pixel_request(
                "?id=abc123&s=!!!not-base64&to=%25zz&cb=&junk",
                "Mozilla/5.0",
            ))
            .await
            .unwrap();
        assert_pixel_response(response).await;
    }

    #[tokio::test]
    async fn bot_user_agent_still_returns_pixel() {
        let (state, dir) = test_app_state();
        let app = build_router(state);

        let response = app
            .oneshot(pixel_request(
                "?id=abc123&s=SGVsbG8&to=a%40b.com",
                "Mozilla/5.0 GoogleImageProxy",
            ))
            .await
            .unwrap();
        assert_pixel_response(response).await;

        // Suppressed on the very first occurrence: no log row appears.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let contents =
            std::fs::read_to_string(dir.path().join("opens.csv")).unwrap_or_default();
        assert!(!contents.contains("abc123"));
    }

    #[tokio::test]
    async fn duplicate_fetch_still_returns_pixel() {
        let (state, _dir) = test_app_state();

        for _ in 0..2 {
            let app = build_router(state.clone());
            let response = app
                .oneshot(pixel_request("?id=abc123&cb=7", "Mozilla/5.0"))
                .await
                .unwrap();
            assert_pixel_response(response).await;
        }
    }

    // ─── Send-time registration tests ───

    #[tokio::test]
    async fn sent_registration_returns_ok_and_records() {
        let (state, _dir) = test_app_state();
        let app = build_router(state.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/sent?id=abc123")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            state
                .send_times()
                .lookup(&crate::types::TrackId::from("abc123"))
                .is_some()
        );
    }

    #[tokio::test]
    async fn sent_registration_is_idempotent() {
        let (state, _dir) = test_app_state();

        for _ in 0..2 {
            let app = build_router(state.clone());
            let request = Request::builder()
                .method("POST")
                .uri("/sent?id=abc123")
                .body(Body::empty())
                .unwrap();
            let response = app.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(state.send_times().len(), 1);
    }

    #[tokio::test]
    async fn premature_fetch_after_registration_returns_pixel() {
        let (state, dir) = test_app_state();

        let app = build_router(state.clone());
        let register = Request::builder()
            .method("POST")
            .uri("/sent?id=abc123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(register).await.unwrap().status(), StatusCode::OK);

        // Fetch arrives immediately after the registered send time.
        let app = build_router(state);
        let response = app
            .oneshot(pixel_request("?id=abc123", "Mozilla/5.0"))
            .await
            .unwrap();
        assert_pixel_response(response).await;

        // Suppressed as premature: nothing logged.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let contents =
            std::fs::read_to_string(dir.path().join("opens.csv")).unwrap_or_default();
        assert!(!contents.contains("abc123"));
    }

    // ─── Health endpoint tests ───

    #[tokio::test]
    async fn health_returns_200() {
        let (state, _dir) = test_app_state();
        let app = build_router(state);

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn root_returns_confirmation_string() {
        let (state, _dir) = test_app_state();
        let app = build_router(state);

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(std::str::from_utf8(&body).unwrap().contains("Tracker up"));
    }
}
