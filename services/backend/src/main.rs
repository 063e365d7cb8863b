use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casino_backend::config::Config;
use casino_backend::games::OsEntropy;
use casino_backend::state::AppState;
use casino_backend::{build_notifier, build_router, connect_store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with JSON formatting (configurable via env)
    let use_json = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "text".to_string())
        .eq_ignore_ascii_case("json");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "casino_backend=info,tower_http=info".into());

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        service = "casino-backend",
        version = env!("CARGO_PKG_VERSION"),
        log_format = if use_json { "json" } else { "text" },
        "Starting casino backend"
    );

    let config = Config::load()?;
    tracing::info!(storage = ?config.storage, "Configuration loaded");

    let store = connect_store(&config).await?;
    let notifier = build_notifier(&config)?;
    tracing::info!(channel = notifier.name(), "Withdrawal notifications ready");

    let api_port = config.api_port;
    let metrics_port = config.metrics_port;
    let app_state = AppState::new(config, store, Arc::new(OsEntropy), notifier)?;
    let app = build_router(app_state);

    let metrics_handle = tokio::spawn(start_metrics_server(metrics_port));

    let addr = SocketAddr::from(([0, 0, 0, 0], api_port));
    tracing::info!("Casino API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    metrics_handle.abort();
    tracing::info!("Casino backend stopped");
    Ok(())
}

async fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let handle = builder.install_recorder()?;

    let app = Router::new().route("/metrics", get(|| async move { handle.render() }));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Metrics server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
