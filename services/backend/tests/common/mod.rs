//! Common test utilities and fixtures for integration tests
#![allow(dead_code)]

use axum_test::TestServer;
use rust_decimal::Decimal;
use serde_json::Value;
use shared::SxAmount;
use std::sync::Arc;
use std::time::Duration;

use casino_backend::build_router;
use casino_backend::config::Config;
use casino_backend::domain::Balance;
use casino_backend::games::ScriptedOutcomes;
use casino_backend::ledger::LedgerEngine;
use casino_backend::notifications::RecordingNotifier;
use casino_backend::repository::{LedgerStore, MemoryLedgerStore};
use casino_backend::state::AppState;

pub const ADMIN_KEY: &str = "test-admin-key";

/// Application wired to the in-memory store, scripted draws and a recording notifier
pub struct TestContext {
    pub state: AppState,
    pub outcomes: Arc<ScriptedOutcomes>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryLedgerStore::new(Duration::from_millis(500))))
    }

    pub fn with_store(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_config(store, &[])
    }

    pub fn with_config(store: Arc<dyn LedgerStore>, overrides: &[(&str, &str)]) -> Self {
        let outcomes = Arc::new(ScriptedOutcomes::new(Vec::new()));
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::new(test_config(overrides), store, outcomes.clone(), notifier.clone())
            .expect("Failed to build app state");
        Self {
            state,
            outcomes,
            notifier,
        }
    }

    pub fn ledger(&self) -> &Arc<LedgerEngine> {
        &self.state.ledger
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(build_router(self.state.clone())).expect("Failed to start test server")
    }

    /// Queue the next game draws
    pub fn force_draws(&self, draws: impl IntoIterator<Item = u32>) {
        self.outcomes.push(draws);
    }

    /// Open an account and credit `earned` on top of the signup bonus
    pub async fn funded_user(&self, user_id: &str, earned: Decimal) -> Balance {
        let balance = self
            .ledger()
            .open_account(user_id)
            .await
            .expect("Failed to open account");
        if earned.is_zero() {
            return balance;
        }
        self.ledger()
            .credit_bonus(user_id, sx(earned), "test")
            .await
            .expect("Failed to fund account")
    }
}

/// Configuration with test defaults; `overrides` replace single keys
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    Config::from_lookup(|key| {
        overrides
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
            .or_else(|| (key == "ADMIN_API_KEY").then(|| ADMIN_KEY.to_string()))
    })
    .expect("Failed to build test config")
}

pub fn sx(amount: Decimal) -> SxAmount {
    SxAmount::new(amount).expect("Invalid test amount")
}

/// Parse error response and extract code, message, and category
pub fn parse_error(body: &Value) -> Option<(String, String, String)> {
    let error = body.get("error")?;
    Some((
        error.get("code")?.as_str()?.to_string(),
        error.get("message")?.as_str()?.to_string(),
        error.get("category")?.as_str()?.to_string(),
    ))
}
