use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::SxAmount;
use uuid::Uuid;

use crate::domain::{Balance, Transaction, WithdrawalRequest, WithdrawalStatus};
use crate::errors::Result;

/// Persistent home of balances, the transaction log and withdrawal requests
///
/// Every balance mutation goes through [`LedgerStore::begin`], which opens the
/// per-user critical section. Reads outside a transaction may observe any
/// committed state but never a partial commit.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Short backend name for logs and health output
    fn name(&self) -> &'static str;

    /// Create the account if absent; returns the stored balance either way
    async fn create_account(&self, opening: Balance) -> Result<Balance>;

    async fn load_balance(&self, user_id: &str) -> Result<Option<Balance>>;

    /// Newest first
    async fn list_transactions(&self, user_id: &str, limit: usize) -> Result<Vec<Transaction>>;

    /// Oldest first, for replay
    async fn all_transactions(&self, user_id: &str) -> Result<Vec<Transaction>>;

    async fn insert_withdrawal(&self, request: &WithdrawalRequest) -> Result<()>;

    async fn find_withdrawal(&self, request_id: Uuid) -> Result<Option<WithdrawalRequest>>;

    /// Newest first
    async fn list_withdrawals(&self, user_id: &str) -> Result<Vec<WithdrawalRequest>>;

    /// Enter the user's critical section; `AccountNotFound` if the user is unknown
    async fn begin(&self, user_id: &str) -> Result<Box<dyn LedgerTx>>;

    async fn health_check(&self) -> Result<()>;
}

/// An open per-user critical section
///
/// Dropping without calling [`LedgerTx::commit`] discards every change.
#[async_trait]
pub trait LedgerTx: Send {
    /// Balance as read when the section was entered
    fn balance(&self) -> &Balance;

    /// Re-read a withdrawal request of this user inside the section
    async fn withdrawal(&mut self, request_id: Uuid) -> Result<Option<WithdrawalRequest>>;

    /// Apply the whole commit or nothing
    async fn commit(self: Box<Self>, commit: LedgerCommit) -> Result<Balance>;
}

/// Everything one ledger operation writes, applied as a unit
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerCommit {
    pub total_balance: SxAmount,
    pub earned_balance: SxAmount,
    pub updated_at: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
    pub withdrawal: Option<WithdrawalTransition>,
}

impl LedgerCommit {
    pub fn with_transition(mut self, transition: WithdrawalTransition) -> Self {
        self.withdrawal = Some(transition);
        self
    }

    /// The balance row as it will read after this commit
    pub fn applied_to(&self, before: &Balance) -> Balance {
        Balance {
            total_balance: self.total_balance,
            earned_balance: self.earned_balance,
            updated_at: self.updated_at,
            ..before.clone()
        }
    }
}

/// Move a pending request to a terminal status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalTransition {
    pub request_id: Uuid,
    pub status: WithdrawalStatus,
    pub processed_at: DateTime<Utc>,
}

impl WithdrawalTransition {
    pub fn applied_to(&self, request: &WithdrawalRequest) -> WithdrawalRequest {
        WithdrawalRequest {
            status: self.status,
            processed_at: Some(self.processed_at),
            ..request.clone()
        }
    }
}
