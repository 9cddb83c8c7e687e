use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signal_relay::application::router::build_router;
use signal_relay::application::state::AppState;
use signal_relay::config::AppConfig;
use signal_relay::infrastructure::http_sink::HttpSink;
use signal_relay::persistence::init_database;
use signal_relay::rate_limit::create_rate_limiter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signal_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Signal relay starting...");

    let config = AppConfig::from_env()?;
    if config.webhook_secret.is_none() {
        warn!("⚠️  WEBHOOK_SECRET not set: every webhook submission will be accepted");
    }
    info!(
        "Destinations: telegram={} discord={} external={}",
        config.destinations.telegram.is_some(),
        config.destinations.discord_webhook_url.is_some(),
        config.destinations.external_dashboard_url.is_some()
    );

    let pool = init_database(&config.database).await?;
    let sink = Arc::new(HttpSink::new(config.forward_timeout)?);
    let state = AppState::new(pool.clone(), &config, sink);
    let app = build_router(state, create_rate_limiter(&config.rate_limit));

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Server shutting down gracefully...");
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}
