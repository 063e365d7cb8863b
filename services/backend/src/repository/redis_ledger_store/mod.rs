//! Redis ledger store
//!
//! Redis has no row locks, so the critical section is optimistic: `begin`
//! reads the balance with its `version`, and the commit script applies the
//! write only if the version is unchanged. A lost race surfaces as
//! `AppError::Conflict` and the engine replays the operation.

mod deserialization;
mod keys;
mod lua_scripts;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;
use uuid::Uuid;

use super::ledger_store::{LedgerCommit, LedgerStore, LedgerTx};
use crate::domain::{Balance, Transaction, WithdrawalRequest, WithdrawalStatus};
use crate::errors::{AppError, Result};

pub use deserialization::*;
pub use keys::*;
pub use lua_scripts::*;

pub struct RedisLedgerStore {
    redis: ConnectionManager,
}

impl RedisLedgerStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let redis = client.get_connection_manager().await?;
        Ok(Self::new(redis))
    }

    async fn read_balance(&self, user_id: &str) -> Result<Option<VersionedBalance>> {
        let mut conn = self.redis.clone();
        let map: HashMap<String, String> = conn.hgetall(balance_key(user_id)).await?;
        balance_from_hash(user_id, &map)
    }
}

async fn read_withdrawal(
    conn: &mut ConnectionManager,
    user_id: &str,
    request_id: Uuid,
) -> Result<Option<WithdrawalRequest>> {
    let raw: Option<String> = conn
        .hget(withdrawals_key(user_id), request_id.to_string())
        .await?;
    raw.as_deref().map(withdrawal_from_json).transpose()
}

#[async_trait]
impl LedgerStore for RedisLedgerStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn create_account(&self, opening: Balance) -> Result<Balance> {
        let mut conn = self.redis.clone();
        let script = Script::new(CREATE_ACCOUNT_SCRIPT);
        let created: i64 = script
            .key(balance_key(&opening.user_id))
            .arg(&opening.user_id)
            .arg(opening.total_balance.as_decimal().to_string())
            .arg(opening.earned_balance.as_decimal().to_string())
            .arg(opening.bonus_balance.as_decimal().to_string())
            .arg(opening.created_at.timestamp_millis())
            .arg(opening.updated_at.timestamp_millis())
            .invoke_async(&mut conn)
            .await?;

        if created == 1 {
            tracing::debug!(user_id = %opening.user_id, "Balance hash created");
        }

        self.read_balance(&opening.user_id)
            .await?
            .map(|versioned| versioned.balance)
            .ok_or_else(|| AppError::AccountNotFound(opening.user_id.clone()))
    }

    async fn load_balance(&self, user_id: &str) -> Result<Option<Balance>> {
        Ok(self.read_balance(user_id).await?.map(|v| v.balance))
    }

    async fn list_transactions(&self, user_id: &str, limit: usize) -> Result<Vec<Transaction>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.redis.clone();
        let start = -isize::try_from(limit).unwrap_or(isize::MAX);
        let raw: Vec<String> = conn.lrange(txlog_key(user_id), start, -1).await?;
        raw.iter()
            .rev()
            .map(|entry| transaction_from_json(entry))
            .collect()
    }

    async fn all_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let mut conn = self.redis.clone();
        let raw: Vec<String> = conn.lrange(txlog_key(user_id), 0, -1).await?;
        raw.iter().map(|entry| transaction_from_json(entry)).collect()
    }

    async fn insert_withdrawal(&self, request: &WithdrawalRequest) -> Result<()> {
        let mut conn = self.redis.clone();
        let script = Script::new(INSERT_WITHDRAWAL_SCRIPT);
        let stored: i64 = script
            .key(balance_key(&request.user_id))
            .key(withdrawals_key(&request.user_id))
            .key(withdrawal_owner_key())
            .arg(request.id.to_string())
            .arg(serde_json::to_string(request)?)
            .arg(&request.user_id)
            .invoke_async(&mut conn)
            .await?;

        if stored == 0 {
            return Err(AppError::AccountNotFound(request.user_id.clone()));
        }
        Ok(())
    }

    async fn find_withdrawal(&self, request_id: Uuid) -> Result<Option<WithdrawalRequest>> {
        let mut conn = self.redis.clone();
        let owner: Option<String> = conn
            .hget(withdrawal_owner_key(), request_id.to_string())
            .await?;
        match owner {
            Some(user_id) => read_withdrawal(&mut conn, &user_id, request_id).await,
            None => Ok(None),
        }
    }

    async fn list_withdrawals(&self, user_id: &str) -> Result<Vec<WithdrawalRequest>> {
        let mut conn = self.redis.clone();
        let raw: Vec<String> = conn.hvals(withdrawals_key(user_id)).await?;
        let mut requests = raw
            .iter()
            .map(|entry| withdrawal_from_json(entry))
            .collect::<Result<Vec<_>>>()?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn begin(&self, user_id: &str) -> Result<Box<dyn LedgerTx>> {
        let versioned = self
            .read_balance(user_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(user_id.to_string()))?;

        Ok(Box::new(RedisLedgerTx {
            redis: self.redis.clone(),
            balance: versioned.balance,
            version: versioned.version,
            requests: HashMap::new(),
        }))
    }

    async fn health_check(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

struct RedisLedgerTx {
    redis: ConnectionManager,
    balance: Balance,
    version: u64,
    /// Requests read inside this section, reused to build the commit
    requests: HashMap<Uuid, WithdrawalRequest>,
}

#[async_trait]
impl LedgerTx for RedisLedgerTx {
    fn balance(&self) -> &Balance {
        &self.balance
    }

    async fn withdrawal(&mut self, request_id: Uuid) -> Result<Option<WithdrawalRequest>> {
        let request = read_withdrawal(&mut self.redis, &self.balance.user_id, request_id).await?;
        if let Some(request) = &request {
            self.requests.insert(request_id, request.clone());
        }
        Ok(request)
    }

    async fn commit(mut self: Box<Self>, commit: LedgerCommit) -> Result<Balance> {
        let user_id = self.balance.user_id.clone();

        let (request_id, request_json) = match &commit.withdrawal {
            Some(transition) => {
                let request = match self.requests.remove(&transition.request_id) {
                    Some(request) => request,
                    None => self
                        .withdrawal(transition.request_id)
                        .await?
                        .ok_or(AppError::WithdrawalNotFound(transition.request_id))?,
                };
                (
                    transition.request_id.to_string(),
                    serde_json::to_string(&transition.applied_to(&request))?,
                )
            }
            None => (String::new(), String::new()),
        };

        let script = Script::new(COMMIT_LEDGER_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(balance_key(&user_id))
            .key(txlog_key(&user_id))
            .key(withdrawals_key(&user_id))
            .arg(self.version)
            .arg(commit.total_balance.as_decimal().to_string())
            .arg(commit.earned_balance.as_decimal().to_string())
            .arg(commit.updated_at.timestamp_millis())
            .arg(request_id)
            .arg(request_json);
        for entry in &commit.transactions {
            invocation.arg(serde_json::to_string(entry)?);
        }

        let reply: Vec<String> = invocation.invoke_async(&mut self.redis).await?;
        match reply.first().map(String::as_str) {
            Some("ok") => Ok(commit.applied_to(&self.balance)),
            Some("conflict") => {
                tracing::debug!(user_id = %user_id, version = self.version, "Balance version moved");
                Err(AppError::Conflict(format!(
                    "Balance of {} changed during commit",
                    user_id
                )))
            }
            Some("missing_account") => Err(AppError::AccountNotFound(user_id)),
            Some("missing_withdrawal") | Some("processed") => {
                let id = commit
                    .withdrawal
                    .map(|t| t.request_id)
                    .unwrap_or_else(Uuid::nil);
                match reply.get(1) {
                    Some(status) => Err(AppError::AlreadyProcessed {
                        id,
                        status: status
                            .parse::<WithdrawalStatus>()
                            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?,
                    }),
                    None => Err(AppError::WithdrawalNotFound(id)),
                }
            }
            other => Err(AppError::Internal(anyhow::anyhow!(
                "Unexpected commit script reply: {:?}",
                other
            ))),
        }
    }
}
