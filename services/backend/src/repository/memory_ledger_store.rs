//! In-process ledger store
//!
//! Each account sits behind its own `tokio::sync::Mutex`, so operations on
//! different users never contend. Lock acquisition is bounded by
//! `lock_timeout`. A commit validates first and then mutates without any
//! await point, so a cancelled caller can never leave half a write behind.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::ledger_store::{LedgerCommit, LedgerStore, LedgerTx};
use crate::domain::{Balance, Transaction, WithdrawalRequest};
use crate::errors::{AppError, Result};

struct Account {
    balance: Balance,
    /// Creation order
    transactions: Vec<Transaction>,
    /// Creation order
    withdrawals: Vec<WithdrawalRequest>,
}

type AccountCell = Arc<Mutex<Account>>;

pub struct MemoryLedgerStore {
    accounts: RwLock<HashMap<String, AccountCell>>,
    withdrawal_owners: RwLock<HashMap<Uuid, String>>,
    lock_timeout: Duration,
}

impl MemoryLedgerStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            withdrawal_owners: RwLock::new(HashMap::new()),
            lock_timeout,
        }
    }

    fn account(&self, user_id: &str) -> Result<Option<AccountCell>> {
        let accounts = self.accounts.read().map_err(|_| poisoned("accounts"))?;
        Ok(accounts.get(user_id).cloned())
    }

    fn owner_of(&self, request_id: Uuid) -> Result<Option<String>> {
        let owners = self
            .withdrawal_owners
            .read()
            .map_err(|_| poisoned("withdrawal index"))?;
        Ok(owners.get(&request_id).cloned())
    }

    async fn lock(&self, user_id: &str, cell: AccountCell) -> Result<OwnedMutexGuard<Account>> {
        tokio::time::timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(
                    user_id = %user_id,
                    timeout_ms = self.lock_timeout.as_millis() as u64,
                    "Ledger lock wait timed out"
                );
                AppError::LockTimeout(user_id.to_string())
            })
    }

    async fn lock_existing(&self, user_id: &str) -> Result<Option<OwnedMutexGuard<Account>>> {
        match self.account(user_id)? {
            Some(cell) => Ok(Some(self.lock(user_id, cell).await?)),
            None => Ok(None),
        }
    }
}

fn poisoned(what: &str) -> AppError {
    AppError::Internal(anyhow::anyhow!("{} lock poisoned", what))
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create_account(&self, opening: Balance) -> Result<Balance> {
        let cell = {
            let mut accounts = self.accounts.write().map_err(|_| poisoned("accounts"))?;
            accounts
                .entry(opening.user_id.clone())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(Account {
                        balance: opening.clone(),
                        transactions: Vec::new(),
                        withdrawals: Vec::new(),
                    }))
                })
                .clone()
        };

        let account = self.lock(&opening.user_id, cell).await?;
        Ok(account.balance.clone())
    }

    async fn load_balance(&self, user_id: &str) -> Result<Option<Balance>> {
        Ok(self
            .lock_existing(user_id)
            .await?
            .map(|account| account.balance.clone()))
    }

    async fn list_transactions(&self, user_id: &str, limit: usize) -> Result<Vec<Transaction>> {
        Ok(self
            .lock_existing(user_id)
            .await?
            .map(|account| {
                account
                    .transactions
                    .iter()
                    .rev()
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn all_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        Ok(self
            .lock_existing(user_id)
            .await?
            .map(|account| account.transactions.clone())
            .unwrap_or_default())
    }

    async fn insert_withdrawal(&self, request: &WithdrawalRequest) -> Result<()> {
        let mut account = self
            .lock_existing(&request.user_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(request.user_id.clone()))?;

        self.withdrawal_owners
            .write()
            .map_err(|_| poisoned("withdrawal index"))?
            .insert(request.id, request.user_id.clone());
        account.withdrawals.push(request.clone());
        Ok(())
    }

    async fn find_withdrawal(&self, request_id: Uuid) -> Result<Option<WithdrawalRequest>> {
        let Some(user_id) = self.owner_of(request_id)? else {
            return Ok(None);
        };
        Ok(self.lock_existing(&user_id).await?.and_then(|account| {
            account
                .withdrawals
                .iter()
                .find(|r| r.id == request_id)
                .cloned()
        }))
    }

    async fn list_withdrawals(&self, user_id: &str) -> Result<Vec<WithdrawalRequest>> {
        Ok(self
            .lock_existing(user_id)
            .await?
            .map(|account| account.withdrawals.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn begin(&self, user_id: &str) -> Result<Box<dyn LedgerTx>> {
        let guard = self
            .lock_existing(user_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(user_id.to_string()))?;
        Ok(Box::new(MemoryLedgerTx { guard }))
    }

    async fn health_check(&self) -> Result<()> {
        self.accounts
            .read()
            .map(|_| ())
            .map_err(|_| poisoned("accounts"))
    }
}

struct MemoryLedgerTx {
    guard: OwnedMutexGuard<Account>,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    fn balance(&self) -> &Balance {
        &self.guard.balance
    }

    async fn withdrawal(&mut self, request_id: Uuid) -> Result<Option<WithdrawalRequest>> {
        Ok(self
            .guard
            .withdrawals
            .iter()
            .find(|r| r.id == request_id)
            .cloned())
    }

    async fn commit(mut self: Box<Self>, commit: LedgerCommit) -> Result<Balance> {
        let account = &mut *self.guard;

        let transition = match &commit.withdrawal {
            Some(transition) => {
                let index = account
                    .withdrawals
                    .iter()
                    .position(|r| r.id == transition.request_id)
                    .ok_or(AppError::WithdrawalNotFound(transition.request_id))?;
                let current = &account.withdrawals[index];
                if current.status.is_terminal() {
                    return Err(AppError::AlreadyProcessed {
                        id: current.id,
                        status: current.status,
                    });
                }
                Some((index, *transition))
            }
            None => None,
        };

        account.balance = commit.applied_to(&account.balance);
        account.transactions.extend(commit.transactions);
        if let Some((index, transition)) = transition {
            let updated = transition.applied_to(&account.withdrawals[index]);
            account.withdrawals[index] = updated;
        }

        Ok(account.balance.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TransactionKind, WithdrawalStatus};
    use crate::repository::ledger_store::WithdrawalTransition;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use shared::SxAmount;

    fn store() -> MemoryLedgerStore {
        MemoryLedgerStore::new(Duration::from_millis(50))
    }

    fn opening(user_id: &str) -> Balance {
        Balance::opening(user_id, SxAmount::new(dec!(5)).unwrap(), Utc::now())
    }

    fn bonus_entry(user_id: &str, balance_after: SxAmount) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            kind: TransactionKind::Bonus,
            game_type: None,
            amount: dec!(1.00),
            balance_after,
            game_data: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_account_is_idempotent() {
        let store = store();
        let first = store.create_account(opening("alice")).await.unwrap();

        let mut second_opening = opening("alice");
        second_opening.total_balance = SxAmount::new(dec!(99)).unwrap();
        let second = store.create_account(second_opening).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.total_balance, SxAmount::new(dec!(5)).unwrap());
    }

    #[tokio::test]
    async fn test_begin_unknown_user() {
        let result = store().begin("ghost").await;
        assert!(matches!(result, Err(AppError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_dropped_tx_writes_nothing() {
        let store = store();
        store.create_account(opening("alice")).await.unwrap();

        let tx = store.begin("alice").await.unwrap();
        drop(tx);

        assert!(store.all_transactions("alice").await.unwrap().is_empty());
        assert!(store.begin("alice").await.is_ok());
    }

    #[tokio::test]
    async fn test_second_lock_times_out() {
        let store = store();
        store.create_account(opening("alice")).await.unwrap();
        store.create_account(opening("bob")).await.unwrap();

        let _held = store.begin("alice").await.unwrap();
        let result = store.begin("alice").await;
        assert!(matches!(result, Err(AppError::LockTimeout(_))));

        // Other users are unaffected
        assert!(store.begin("bob").await.is_ok());
    }

    #[tokio::test]
    async fn test_commit_applies_balance_and_log() {
        let store = store();
        let before = store.create_account(opening("alice")).await.unwrap();
        let six = SxAmount::new(dec!(6)).unwrap();

        let tx = store.begin("alice").await.unwrap();
        let after = tx
            .commit(LedgerCommit {
                total_balance: six,
                earned_balance: SxAmount::new(dec!(1)).unwrap(),
                updated_at: Utc::now(),
                transactions: vec![bonus_entry("alice", six)],
                withdrawal: None,
            })
            .await
            .unwrap();

        assert_eq!(after.total_balance, six);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(store.list_transactions("alice", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_request_blocks_whole_commit() {
        let store = store();
        let balance = store.create_account(opening("alice")).await.unwrap();
        let mut request =
            WithdrawalRequest::pending("alice", SxAmount::new(dec!(1)).unwrap(), Utc::now());
        request.status = WithdrawalStatus::Rejected;
        store.insert_withdrawal(&request).await.unwrap();

        let tx = store.begin("alice").await.unwrap();
        let result = tx
            .commit(LedgerCommit {
                total_balance: SxAmount::ZERO,
                earned_balance: SxAmount::ZERO,
                updated_at: Utc::now(),
                transactions: vec![bonus_entry("alice", SxAmount::ZERO)],
                withdrawal: Some(WithdrawalTransition {
                    request_id: request.id,
                    status: WithdrawalStatus::Approved,
                    processed_at: Utc::now(),
                }),
            })
            .await;

        assert!(matches!(result, Err(AppError::AlreadyProcessed { .. })));
        assert_eq!(store.load_balance("alice").await.unwrap(), Some(balance));
        assert!(store.all_transactions("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_withdrawals_are_found_by_id_and_listed_newest_first() {
        let store = store();
        store.create_account(opening("alice")).await.unwrap();
        let first = WithdrawalRequest::pending("alice", SxAmount::new(dec!(1)).unwrap(), Utc::now());
        let second = WithdrawalRequest::pending("alice", SxAmount::new(dec!(2)).unwrap(), Utc::now());
        store.insert_withdrawal(&first).await.unwrap();
        store.insert_withdrawal(&second).await.unwrap();

        assert_eq!(store.find_withdrawal(first.id).await.unwrap(), Some(first.clone()));
        assert_eq!(store.find_withdrawal(Uuid::new_v4()).await.unwrap(), None);

        let listed = store.list_withdrawals("alice").await.unwrap();
        assert_eq!(listed, vec![second, first]);
    }
}
