use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use shared::{SxAmount, MAX_TRANSACTION_PAGE};

use super::audit;
use super::retry::CommitRetryPolicy;
use super::rules;
use crate::domain::{
    AuditReport, Balance, Transaction, TransactionData, WithdrawalRequest, WithdrawalStatus,
};
use crate::errors::{AppError, Result};
use crate::repository::LedgerStore;

/// Result of a settled play
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub balance: Balance,
    /// The `bet` entry followed by the `win` or `loss` entry
    pub transactions: Vec<Transaction>,
}

/// Sole owner of balance mutations
///
/// Every mutating operation runs inside the store's per-user critical
/// section: read the balance, plan the commit, apply it as one unit.
pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
    retry: CommitRetryPolicy,
    signup_bonus: SxAmount,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>, retry: CommitRetryPolicy, signup_bonus: SxAmount) -> Self {
        Self {
            store,
            retry,
            signup_bonus,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn signup_bonus(&self) -> SxAmount {
        self.signup_bonus
    }

    /// Create the account with the signup credit; returns the existing balance on repeat
    #[tracing::instrument(skip(self))]
    pub async fn open_account(&self, user_id: &str) -> Result<Balance> {
        if user_id.trim().is_empty() {
            return Err(AppError::InvalidInput("user id must not be empty".to_string()));
        }
        let balance = self
            .store
            .create_account(Balance::opening(user_id, self.signup_bonus, Utc::now()))
            .await?;
        tracing::info!(total = %balance.total_balance, "Account ready");
        Ok(balance)
    }

    pub async fn balance(&self, user_id: &str) -> Result<Balance> {
        self.store
            .load_balance(user_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(user_id.to_string()))
    }

    /// Newest first, clamped to the page cap
    pub async fn transactions(&self, user_id: &str, limit: usize) -> Result<Vec<Transaction>> {
        self.balance(user_id).await?;
        let limit = limit.clamp(1, MAX_TRANSACTION_PAGE);
        self.store.list_transactions(user_id, limit).await
    }

    /// Apply one game play: debit the bet, credit the winnings
    ///
    /// Fails with `InsufficientFunds` and writes nothing if the current total
    /// cannot cover the bet.
    #[tracing::instrument(
        skip(self, game_data),
        fields(game_type = ?game_data.game_type(), bet = %bet.as_decimal(), winnings = %winnings.as_decimal())
    )]
    pub async fn settle(
        &self,
        user_id: &str,
        bet: SxAmount,
        winnings: SxAmount,
        game_data: &TransactionData,
    ) -> Result<Settlement> {
        let settlement = self
            .with_commit_retry(user_id, move || self.try_settle(user_id, bet, winnings, game_data))
            .await?;

        metrics::counter!("ledger_settlements_total").increment(1);
        tracing::debug!(new_total = %settlement.balance.total_balance, "Settled");
        Ok(settlement)
    }

    async fn try_settle(
        &self,
        user_id: &str,
        bet: SxAmount,
        winnings: SxAmount,
        game_data: &TransactionData,
    ) -> Result<Settlement> {
        let tx = self.store.begin(user_id).await?;
        let commit = rules::plan_settlement(tx.balance(), bet, winnings, game_data, Utc::now())?;
        let transactions = commit.transactions.clone();
        let balance = tx.commit(commit).await?;
        Ok(Settlement {
            balance,
            transactions,
        })
    }

    /// Credit an admin grant to total and earned balance
    #[tracing::instrument(skip(self), fields(amount = %amount.as_decimal()))]
    pub async fn credit_bonus(&self, user_id: &str, amount: SxAmount, source: &str) -> Result<Balance> {
        let balance = self
            .with_commit_retry(user_id, move || self.try_credit_bonus(user_id, amount, source))
            .await?;

        metrics::counter!("bonus_grants_total").increment(1);
        tracing::info!(new_total = %balance.total_balance, "Bonus credited");
        Ok(balance)
    }

    /// Debit earned funds outside the request flow
    #[tracing::instrument(skip(self), fields(amount = %amount.as_decimal()))]
    pub async fn debit_withdrawal(&self, user_id: &str, amount: SxAmount) -> Result<Balance> {
        self.with_commit_retry(user_id, move || self.try_debit(user_id, amount))
            .await
    }

    async fn try_credit_bonus(&self, user_id: &str, amount: SxAmount, source: &str) -> Result<Balance> {
        let tx = self.store.begin(user_id).await?;
        let commit = rules::plan_bonus(tx.balance(), amount, source, Utc::now())?;
        tx.commit(commit).await
    }

    async fn try_debit(&self, user_id: &str, amount: SxAmount) -> Result<Balance> {
        let tx = self.store.begin(user_id).await?;
        let commit = rules::plan_withdrawal_debit(tx.balance(), amount, None, Utc::now())?;
        tx.commit(commit).await
    }

    /// Approve a pending request, re-checking the earned balance as it is now
    ///
    /// On `InsufficientEarnedBalance` the request stays pending.
    #[tracing::instrument(skip(self))]
    pub async fn approve_withdrawal(&self, request_id: Uuid) -> Result<WithdrawalRequest> {
        let owner = self.owner_of(request_id).await?;
        let owner = owner.as_str();

        let request = self
            .with_commit_retry(owner, move || self.try_approve(owner, request_id))
            .await?;

        metrics::counter!("withdrawals_processed_total", "status" => "approved").increment(1);
        tracing::info!(user_id = %owner, amount = %request.amount, "Withdrawal approved");
        Ok(request)
    }

    /// Reject a pending request; records a zero-amount audit entry
    #[tracing::instrument(skip(self))]
    pub async fn reject_withdrawal(&self, request_id: Uuid) -> Result<WithdrawalRequest> {
        let owner = self.owner_of(request_id).await?;
        let owner = owner.as_str();

        let request = self
            .with_commit_retry(owner, move || self.try_reject(owner, request_id))
            .await?;

        metrics::counter!("withdrawals_processed_total", "status" => "rejected").increment(1);
        tracing::info!(user_id = %owner, amount = %request.amount, "Withdrawal rejected");
        Ok(request)
    }

    async fn try_approve(&self, owner: &str, request_id: Uuid) -> Result<WithdrawalRequest> {
        let mut tx = self.store.begin(owner).await?;
        let request = pending_request(tx.withdrawal(request_id).await?, request_id)?;
        let now = Utc::now();
        let commit = rules::plan_withdrawal_debit(tx.balance(), request.amount, Some(request_id), now)?;
        tx.commit(commit).await?;
        Ok(WithdrawalRequest {
            status: WithdrawalStatus::Approved,
            processed_at: Some(now),
            ..request
        })
    }

    async fn try_reject(&self, owner: &str, request_id: Uuid) -> Result<WithdrawalRequest> {
        let mut tx = self.store.begin(owner).await?;
        let request = pending_request(tx.withdrawal(request_id).await?, request_id)?;
        let now = Utc::now();
        let commit = rules::plan_withdrawal_rejection(tx.balance(), request_id, now);
        tx.commit(commit).await?;
        Ok(WithdrawalRequest {
            status: WithdrawalStatus::Rejected,
            processed_at: Some(now),
            ..request
        })
    }

    /// Replay the full transaction log against the stored balance
    #[tracing::instrument(skip(self))]
    pub async fn audit(&self, user_id: &str) -> Result<AuditReport> {
        let balance = self.balance(user_id).await?;
        let transactions = self.store.all_transactions(user_id).await?;
        let report = audit::replay(self.signup_bonus, &transactions, &balance);
        if !report.balanced || !report.snapshots_consistent {
            tracing::error!(
                replayed = %report.replayed_total,
                stored = %report.stored_total.as_decimal(),
                "Ledger audit failed"
            );
        }
        Ok(report)
    }

    async fn owner_of(&self, request_id: Uuid) -> Result<String> {
        self.store
            .find_withdrawal(request_id)
            .await?
            .map(|request| request.user_id)
            .ok_or(AppError::WithdrawalNotFound(request_id))
    }

    /// Repeat `attempt` while the store reports a concurrent modification
    async fn with_commit_retry<T, F, Fut>(&self, user_id: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut tries = 1;
        loop {
            match attempt().await {
                Err(AppError::Conflict(_)) if tries < self.retry.max_attempts => {
                    metrics::counter!("ledger_commit_conflicts_total").increment(1);
                    tracing::debug!(user_id = %user_id, attempt = tries, "Commit conflict, retrying");
                    tokio::time::sleep(self.retry.backoff(tries)).await;
                    tries += 1;
                }
                Err(AppError::Conflict(user)) => {
                    metrics::counter!("ledger_commit_conflicts_total").increment(1);
                    tracing::warn!(user_id = %user_id, attempts = tries, "Commit retries exhausted");
                    return Err(AppError::Conflict(user));
                }
                other => return other,
            }
        }
    }
}

fn pending_request(request: Option<WithdrawalRequest>, request_id: Uuid) -> Result<WithdrawalRequest> {
    let request = request.ok_or(AppError::WithdrawalNotFound(request_id))?;
    if request.status.is_terminal() {
        return Err(AppError::AlreadyProcessed {
            id: request.id,
            status: request.status,
        });
    }
    Ok(request)
}
