//! Parsing of ledger records stored in Redis

use chrono::{DateTime, TimeZone, Utc};
use shared::SxAmount;
use std::collections::HashMap;

use crate::domain::{Balance, Transaction, WithdrawalRequest};
use crate::errors::{AppError, Result};

/// A balance together with the version it was read at
#[derive(Debug, Clone)]
pub struct VersionedBalance {
    pub balance: Balance,
    pub version: u64,
}

fn invalid(field: &str, user_id: &str) -> AppError {
    AppError::Internal(anyhow::anyhow!(
        "Invalid {} in balance hash for {}",
        field,
        user_id
    ))
}

fn amount_field(map: &HashMap<String, String>, field: &str, user_id: &str) -> Result<SxAmount> {
    map.get(field)
        .and_then(|v| v.parse::<SxAmount>().ok())
        .ok_or_else(|| invalid(field, user_id))
}

fn timestamp_field(
    map: &HashMap<String, String>,
    field: &str,
    user_id: &str,
) -> Result<DateTime<Utc>> {
    map.get(field)
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .ok_or_else(|| invalid(field, user_id))
}

/// `Ok(None)` when the hash is empty (no such account)
pub fn balance_from_hash(
    user_id: &str,
    map: &HashMap<String, String>,
) -> Result<Option<VersionedBalance>> {
    if map.is_empty() {
        return Ok(None);
    }

    let version = map
        .get("version")
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| invalid("version", user_id))?;

    Ok(Some(VersionedBalance {
        balance: Balance {
            user_id: user_id.to_string(),
            total_balance: amount_field(map, "total_balance", user_id)?,
            earned_balance: amount_field(map, "earned_balance", user_id)?,
            bonus_balance: amount_field(map, "bonus_balance", user_id)?,
            created_at: timestamp_field(map, "created_at_ms", user_id)?,
            updated_at: timestamp_field(map, "updated_at_ms", user_id)?,
        },
        version,
    }))
}

pub fn transaction_from_json(raw: &str) -> Result<Transaction> {
    Ok(serde_json::from_str(raw)?)
}

pub fn withdrawal_from_json(raw: &str) -> Result<WithdrawalRequest> {
    Ok(serde_json::from_str(raw)?)
}
