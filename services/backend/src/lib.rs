// Library interface for the casino backend - exposes modules for testing

pub mod config;
pub mod domain;
pub mod errors;
pub mod extractors;
pub mod games;
pub mod handlers;
pub mod ledger;
pub mod notifications;
pub mod repository;
pub mod state;
pub mod withdrawals;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use config::{Config, StorageBackend};
use notifications::circuit_breaker::CircuitBreaker;
use notifications::{LogNotifier, WebhookNotifier, WithdrawalNotifier};
use repository::{LedgerStore, MemoryLedgerStore, PostgresLedgerStore, RedisLedgerStore};
use state::AppState;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        .route("/health/detailed", get(handlers::health::detailed_health))
        // Accounts
        .route("/api/accounts", post(handlers::accounts::open_account))
        .route("/api/balance", get(handlers::accounts::get_balance))
        .route("/api/transactions", get(handlers::accounts::list_transactions))
        // Games
        .route("/api/games/:game_type", post(handlers::games::play_game))
        // Withdrawals
        .route("/api/withdrawal/request", post(handlers::withdrawals::request_withdrawal))
        .route("/api/withdrawal/requests", get(handlers::withdrawals::list_requests))
        // Admin
        .route(
            "/api/admin/withdrawals/:id/approve",
            post(handlers::admin::approve_withdrawal),
        )
        .route(
            "/api/admin/withdrawals/:id/reject",
            post(handlers::admin::reject_withdrawal),
        )
        .route("/api/admin/bonus", post(handlers::admin::grant_bonus))
        .route("/api/admin/audit/:user_id", get(handlers::admin::audit_user))
        // State
        .with_state(state)
        // Middleware
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

/// Open the configured ledger store, applying migrations when asked to
pub async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    let store: Arc<dyn LedgerStore> = match config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory ledger store; balances are lost on restart");
            Arc::new(MemoryLedgerStore::new(config.lock_timeout()))
        }
        StorageBackend::Redis => {
            let store = RedisLedgerStore::connect(&config.redis.url).await?;
            tracing::info!("Redis connected");
            Arc::new(store)
        }
        StorageBackend::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
            let store =
                PostgresLedgerStore::connect(url, config.database.pool_size, config.lock_timeout())
                    .await?;
            tracing::info!(pool_size = config.database.pool_size, "Postgres connected");
            if config.database.run_migrations {
                store.migrate().await?;
            }
            Arc::new(store)
        }
    };
    Ok(store)
}

/// Webhook notifier when a URL is configured, log-only otherwise
pub fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn WithdrawalNotifier>> {
    let settings = &config.notifications;
    match &settings.webhook_url {
        Some(url) => {
            let breaker = CircuitBreaker::new(
                settings.failure_threshold,
                Duration::from_secs(settings.reset_timeout_secs),
            );
            let notifier = WebhookNotifier::new(
                url.clone(),
                Duration::from_millis(settings.timeout_ms),
                breaker,
            )?;
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}
