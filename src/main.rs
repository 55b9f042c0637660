use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use open_beacon::config::Config;
use open_beacon::dedup::run_sweeper;
use open_beacon::server::{AppState, build_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "open_beacon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let app_state = AppState::new(&config);

    // Background sweep of the dedup cache and send-time registry. The token
    // stops it on shutdown; until then it runs detached.
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(run_sweeper(
        app_state.cache().clone(),
        app_state.send_times().clone(),
        config.sweep_interval,
        shutdown.clone(),
    ));

    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    })
    .await
    .unwrap();

    shutdown.cancel();
    let _ = sweeper.await;
}
