use shared::{SxAmount, SIGNUP_BONUS};
use std::sync::Arc;

use crate::config::Config;
use crate::games::{GameService, OutcomeSource};
use crate::ledger::LedgerEngine;
use crate::notifications::WithdrawalNotifier;
use crate::repository::LedgerStore;
use crate::withdrawals::WithdrawalService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn LedgerStore>,
    pub ledger: Arc<LedgerEngine>,
    pub games: Arc<GameService>,
    pub withdrawals: Arc<WithdrawalService>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn LedgerStore>,
        outcomes: Arc<dyn OutcomeSource>,
        notifier: Arc<dyn WithdrawalNotifier>,
    ) -> anyhow::Result<Self> {
        let signup_bonus = SxAmount::new(SIGNUP_BONUS)?;
        let ledger = Arc::new(LedgerEngine::new(
            store.clone(),
            config.retry_policy(),
            signup_bonus,
        ));
        let games = Arc::new(GameService::new(ledger.clone(), outcomes));
        let withdrawals = Arc::new(WithdrawalService::new(
            ledger.clone(),
            config.eligibility_policy(),
            notifier,
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            ledger,
            games,
            withdrawals,
        })
    }
}
