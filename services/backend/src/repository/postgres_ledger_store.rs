//! PostgreSQL ledger store
//!
//! The per-user critical section is a database transaction holding
//! `SELECT ... FOR UPDATE` on the balance row, bounded by `SET LOCAL
//! lock_timeout`. Dropping the sqlx transaction rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::SxAmount;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres};
use std::time::Duration;
use uuid::Uuid;

use super::ledger_store::{LedgerCommit, LedgerStore, LedgerTx};
use crate::domain::{Balance, Transaction, WithdrawalRequest, WithdrawalStatus};
use crate::errors::{AppError, Result};

/// SQLSTATE lock_not_available
const LOCK_NOT_AVAILABLE: &str = "55P03";

const BALANCE_COLUMNS: &str =
    "user_id, total_balance, earned_balance, bonus_balance, created_at, updated_at";
const TRANSACTION_COLUMNS: &str =
    "id, user_id, type AS kind, game_type, amount, balance_after, game_data, created_at";
const WITHDRAWAL_COLUMNS: &str = "id, user_id, amount, status, created_at, processed_at";

#[derive(FromRow)]
struct BalanceRow {
    user_id: String,
    total_balance: Decimal,
    earned_balance: Decimal,
    bonus_balance: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BalanceRow {
    fn into_balance(self) -> Result<Balance> {
        Ok(Balance {
            total_balance: stored_amount(self.total_balance, "total_balance")?,
            earned_balance: stored_amount(self.earned_balance, "earned_balance")?,
            bonus_balance: stored_amount(self.bonus_balance, "bonus_balance")?,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: String,
    kind: String,
    game_type: Option<String>,
    amount: Decimal,
    balance_after: Decimal,
    game_data: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_transaction(self) -> Result<Transaction> {
        Ok(Transaction {
            id: self.id,
            kind: self.kind.parse().map_err(corrupt)?,
            game_type: self
                .game_type
                .map(|g| g.parse())
                .transpose()
                .map_err(corrupt)?,
            amount: self.amount,
            balance_after: stored_amount(self.balance_after, "balance_after")?,
            game_data: self.game_data.map(serde_json::from_value).transpose()?,
            user_id: self.user_id,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct WithdrawalRow {
    id: Uuid,
    user_id: String,
    amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl WithdrawalRow {
    fn into_request(self) -> Result<WithdrawalRequest> {
        Ok(WithdrawalRequest {
            id: self.id,
            user_id: self.user_id,
            amount: stored_amount(self.amount, "amount")?,
            status: self.status.parse().map_err(corrupt)?,
            created_at: self.created_at,
            processed_at: self.processed_at,
        })
    }
}

fn stored_amount(value: Decimal, column: &str) -> Result<SxAmount> {
    SxAmount::new(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid stored {}: {}", column, e)))
}

fn corrupt(message: String) -> AppError {
    AppError::Internal(anyhow::anyhow!("Corrupt ledger row: {}", message))
}

fn lock_error(user_id: &str, error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &error {
        if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
            tracing::warn!(user_id = %user_id, "Balance row lock wait timed out");
            return AppError::LockTimeout(user_id.to_string());
        }
    }
    AppError::Database(error)
}

pub struct PostgresLedgerStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    pub async fn connect(url: &str, pool_size: u32, lock_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        Ok(Self::new(pool, lock_timeout))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;
        tracing::info!("Ledger schema migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn create_account(&self, opening: Balance) -> Result<Balance> {
        sqlx::query(
            r#"
            INSERT INTO user_balances (
                user_id, total_balance, earned_balance, bonus_balance, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(&opening.user_id)
        .bind(opening.total_balance.as_decimal())
        .bind(opening.earned_balance.as_decimal())
        .bind(opening.bonus_balance.as_decimal())
        .bind(opening.created_at)
        .bind(opening.updated_at)
        .execute(&self.pool)
        .await?;

        self.load_balance(&opening.user_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(opening.user_id.clone()))
    }

    async fn load_balance(&self, user_id: &str) -> Result<Option<Balance>> {
        let sql = format!("SELECT {} FROM user_balances WHERE user_id = $1", BALANCE_COLUMNS);
        sqlx::query_as::<_, BalanceRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(BalanceRow::into_balance)
            .transpose()
    }

    async fn list_transactions(&self, user_id: &str, limit: usize) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM ledger_transactions WHERE user_id = $1 ORDER BY seq DESC LIMIT $2",
            TRANSACTION_COLUMNS
        );
        sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(user_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(TransactionRow::into_transaction)
            .collect()
    }

    async fn all_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM ledger_transactions WHERE user_id = $1 ORDER BY seq ASC",
            TRANSACTION_COLUMNS
        );
        sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(TransactionRow::into_transaction)
            .collect()
    }

    async fn insert_withdrawal(&self, request: &WithdrawalRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO withdrawal_requests (id, user_id, amount, status, created_at, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(request.id)
        .bind(&request.user_id)
        .bind(request.amount.as_decimal())
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.processed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_withdrawal(&self, request_id: Uuid) -> Result<Option<WithdrawalRequest>> {
        let sql = format!("SELECT {} FROM withdrawal_requests WHERE id = $1", WITHDRAWAL_COLUMNS);
        sqlx::query_as::<_, WithdrawalRow>(&sql)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?
            .map(WithdrawalRow::into_request)
            .transpose()
    }

    async fn list_withdrawals(&self, user_id: &str) -> Result<Vec<WithdrawalRequest>> {
        let sql = format!(
            "SELECT {} FROM withdrawal_requests WHERE user_id = $1 ORDER BY created_at DESC, id",
            WITHDRAWAL_COLUMNS
        );
        sqlx::query_as::<_, WithdrawalRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(WithdrawalRow::into_request)
            .collect()
    }

    async fn begin(&self, user_id: &str) -> Result<Box<dyn LedgerTx>> {
        let mut tx = self.pool.begin().await?;

        // SET cannot take bind parameters; the value is a plain integer
        let set_timeout = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&set_timeout).execute(&mut *tx).await?;

        let sql = format!(
            "SELECT {} FROM user_balances WHERE user_id = $1 FOR UPDATE",
            BALANCE_COLUMNS
        );
        let row = sqlx::query_as::<_, BalanceRow>(&sql)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| lock_error(user_id, e))?
            .ok_or_else(|| AppError::AccountNotFound(user_id.to_string()))?;

        Ok(Box::new(PostgresLedgerTx {
            tx,
            balance: row.into_balance()?,
        }))
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct PostgresLedgerTx {
    tx: sqlx::Transaction<'static, Postgres>,
    balance: Balance,
}

impl PostgresLedgerTx {
    /// Explain why a pending-only update touched no row
    async fn transition_failure(&mut self, request_id: Uuid) -> Result<AppError> {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM withdrawal_requests WHERE id = $1 AND user_id = $2",
        )
        .bind(request_id)
        .bind(&self.balance.user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(match status {
            None => AppError::WithdrawalNotFound(request_id),
            Some(status) => AppError::AlreadyProcessed {
                id: request_id,
                status: status.parse::<WithdrawalStatus>().map_err(corrupt)?,
            },
        })
    }
}

#[async_trait]
impl LedgerTx for PostgresLedgerTx {
    fn balance(&self) -> &Balance {
        &self.balance
    }

    async fn withdrawal(&mut self, request_id: Uuid) -> Result<Option<WithdrawalRequest>> {
        let sql = format!(
            "SELECT {} FROM withdrawal_requests WHERE id = $1 AND user_id = $2 FOR UPDATE",
            WITHDRAWAL_COLUMNS
        );
        sqlx::query_as::<_, WithdrawalRow>(&sql)
            .bind(request_id)
            .bind(&self.balance.user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| lock_error(&self.balance.user_id, e))?
            .map(WithdrawalRow::into_request)
            .transpose()
    }

    async fn commit(mut self: Box<Self>, commit: LedgerCommit) -> Result<Balance> {
        let user_id = self.balance.user_id.clone();

        if let Some(transition) = &commit.withdrawal {
            let updated = sqlx::query(
                r#"
                UPDATE withdrawal_requests
                SET status = $1, processed_at = $2
                WHERE id = $3 AND user_id = $4 AND status = 'pending'
                "#,
            )
            .bind(transition.status.as_str())
            .bind(transition.processed_at)
            .bind(transition.request_id)
            .bind(&user_id)
            .execute(&mut *self.tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(self.transition_failure(transition.request_id).await?);
            }
        }

        sqlx::query(
            r#"
            UPDATE user_balances
            SET total_balance = $1, earned_balance = $2, updated_at = $3
            WHERE user_id = $4
            "#,
        )
        .bind(commit.total_balance.as_decimal())
        .bind(commit.earned_balance.as_decimal())
        .bind(commit.updated_at)
        .bind(&user_id)
        .execute(&mut *self.tx)
        .await?;

        for entry in &commit.transactions {
            let game_data = entry
                .game_data
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?;
            sqlx::query(
                r#"
                INSERT INTO ledger_transactions (
                    id, user_id, type, game_type, amount, balance_after, game_data, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(entry.id)
            .bind(&entry.user_id)
            .bind(entry.kind.as_str())
            .bind(entry.game_type.map(|g| g.as_str()))
            .bind(entry.amount)
            .bind(entry.balance_after.as_decimal())
            .bind(game_data)
            .bind(entry.created_at)
            .execute(&mut *self.tx)
            .await?;
        }

        let balance = commit.applied_to(&self.balance);
        self.tx.commit().await?;
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GameType, TransactionData, TransactionKind};
    use crate::games::CoinSide;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transaction_row_conversion() {
        let data = TransactionData::CoinFlip {
            choice: CoinSide::Heads,
            result: CoinSide::Tails,
            multiplier: 2,
        };
        let row = TransactionRow {
            id: Uuid::new_v4(),
            user_id: "alice".to_string(),
            kind: "loss".to_string(),
            game_type: Some("coin_flip".to_string()),
            amount: dec!(0.00),
            balance_after: dec!(4.00),
            game_data: Some(serde_json::to_value(&data).unwrap()),
            created_at: Utc::now(),
        };

        let entry = row.into_transaction().unwrap();
        assert_eq!(entry.kind, TransactionKind::Loss);
        assert_eq!(entry.game_type, Some(GameType::CoinFlip));
        assert_eq!(entry.game_data, Some(data));
    }

    #[test]
    fn test_corrupt_rows_are_internal_errors() {
        let row = WithdrawalRow {
            id: Uuid::new_v4(),
            user_id: "alice".to_string(),
            amount: dec!(10.00),
            status: "lost".to_string(),
            created_at: Utc::now(),
            processed_at: None,
        };
        assert!(matches!(row.into_request(), Err(AppError::Internal(_))));

        let row = BalanceRow {
            user_id: "alice".to_string(),
            total_balance: dec!(-1.00),
            earned_balance: dec!(0),
            bonus_balance: dec!(5),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(row.into_balance(), Err(AppError::Internal(_))));
    }
}
