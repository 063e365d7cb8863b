use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{SxAmount, DEFAULT_TRANSACTION_PAGE};

use crate::{
    domain::{Balance, Transaction},
    errors::Result,
    extractors::AuthenticatedUser,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(flatten)]
    pub balance: Balance,
    pub can_withdraw: bool,
    pub max_withdrawable: SxAmount,
}

impl BalanceResponse {
    fn new(state: &AppState, balance: Balance) -> Self {
        let policy = state.withdrawals.policy();
        Self {
            can_withdraw: policy.is_eligible(&balance),
            max_withdrawable: policy.max_withdrawable(&balance),
            balance,
        }
    }
}

/// Idempotent: a repeat call returns the existing balance untouched
pub async fn open_account(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<BalanceResponse>> {
    let balance = state.ledger.open_account(&user_id).await?;
    Ok(Json(BalanceResponse::new(&state, balance)))
}

pub async fn get_balance(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<BalanceResponse>> {
    let balance = state.ledger.balance(&user_id).await?;
    Ok(Json(BalanceResponse::new(&state, balance)))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<Transaction>>> {
    let limit = query.limit.unwrap_or(DEFAULT_TRANSACTION_PAGE);
    let transactions = state.ledger.transactions(&user_id, limit).await?;
    Ok(Json(transactions))
}
