use anyhow::{anyhow, bail};
use serde::Deserialize;
use shared::{SxAmount, DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_MAX_COMMIT_ATTEMPTS};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::ledger::CommitRetryPolicy;
use crate::withdrawals::EligibilityPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_port: u16,
    pub metrics_port: u16,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub ledger: LedgerConfig,
    pub withdrawals: WithdrawalConfig,
    pub notifications: NotificationConfig,
    pub admin_api_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Redis,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "redis" => Ok(StorageBackend::Redis),
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Required only when `storage` is postgres
    pub url: Option<String>,
    pub pool_size: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub lock_timeout_ms: u64,
    pub max_commit_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalConfig {
    pub min_total: SxAmount,
    pub min_earned: SxAmount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Unset means notifications are only logged
    pub webhook_url: Option<String>,
    pub timeout_ms: u64,
    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage: StorageBackend = parse_or(&get, "STORAGE_BACKEND", "memory")?;
        let database_url = get("DATABASE_URL");
        if storage == StorageBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }

        let max_commit_attempts: u32 = parse_or(
            &get,
            "LEDGER_MAX_COMMIT_ATTEMPTS",
            &DEFAULT_MAX_COMMIT_ATTEMPTS.to_string(),
        )?;
        if max_commit_attempts == 0 {
            bail!("LEDGER_MAX_COMMIT_ATTEMPTS must be at least 1");
        }

        let admin_api_key = get("ADMIN_API_KEY").ok_or_else(|| anyhow!("ADMIN_API_KEY must be set"))?;

        Ok(Config {
            api_port: parse_or(&get, "API_PORT", "3001")?,
            metrics_port: parse_or(&get, "METRICS_PORT", "9090")?,
            storage,
            database: DatabaseConfig {
                url: database_url,
                pool_size: parse_or(&get, "DATABASE_POOL_SIZE", "20")?,
                run_migrations: parse_or(&get, "DATABASE_RUN_MIGRATIONS", "true")?,
            },
            redis: RedisConfig {
                url: get("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string()),
            },
            ledger: LedgerConfig {
                lock_timeout_ms: parse_or(
                    &get,
                    "LEDGER_LOCK_TIMEOUT_MS",
                    &DEFAULT_LOCK_TIMEOUT_MS.to_string(),
                )?,
                max_commit_attempts,
            },
            withdrawals: WithdrawalConfig {
                min_total: parse_or(&get, "WITHDRAWAL_MIN_TOTAL", "10.00")?,
                min_earned: parse_or(&get, "WITHDRAWAL_MIN_EARNED", "10.00")?,
            },
            notifications: NotificationConfig {
                webhook_url: get("NOTIFY_WEBHOOK_URL"),
                timeout_ms: parse_or(&get, "NOTIFY_TIMEOUT_MS", "5000")?,
                failure_threshold: parse_or(&get, "NOTIFY_FAILURE_THRESHOLD", "5")?,
                reset_timeout_secs: parse_or(&get, "NOTIFY_RESET_TIMEOUT_SECS", "60")?,
            },
            admin_api_key,
        })
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger.lock_timeout_ms)
    }

    pub fn retry_policy(&self) -> CommitRetryPolicy {
        CommitRetryPolicy::with_max_attempts(self.ledger.max_commit_attempts)
    }

    pub fn eligibility_policy(&self) -> EligibilityPolicy {
        EligibilityPolicy {
            min_total: self.withdrawals.min_total,
            min_earned: self.withdrawals.min_earned,
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("Invalid value for {} ('{}'): {}", key, raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("ADMIN_API_KEY", "secret")])).unwrap();
        assert_eq!(config.api_port, 3001);
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert!(config.database.run_migrations);
        assert_eq!(config.lock_timeout(), Duration::from_millis(2000));
        assert_eq!(config.ledger.max_commit_attempts, 5);
        assert_eq!(config.withdrawals.min_earned.as_decimal(), dec!(10.00));
        assert!(config.notifications.webhook_url.is_none());
    }

    #[test]
    fn test_admin_key_is_required() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("ADMIN_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = Config::from_lookup(lookup(&[
            ("ADMIN_API_KEY", "secret"),
            ("STORAGE_BACKEND", "postgres"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let config = Config::from_lookup(lookup(&[
            ("ADMIN_API_KEY", "secret"),
            ("STORAGE_BACKEND", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/casino"),
        ]))
        .unwrap();
        assert_eq!(config.storage, StorageBackend::Postgres);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let bad = [
            ("API_PORT", "http"),
            ("STORAGE_BACKEND", "sqlite"),
            ("WITHDRAWAL_MIN_TOTAL", "10.001"),
            ("LEDGER_MAX_COMMIT_ATTEMPTS", "0"),
        ];
        for (key, value) in bad {
            let result = Config::from_lookup(lookup(&[("ADMIN_API_KEY", "secret"), (key, value)]));
            assert!(result.is_err(), "{}={} should be rejected", key, value);
        }
    }

    #[test]
    fn test_policies_follow_config() {
        let config = Config::from_lookup(lookup(&[
            ("ADMIN_API_KEY", "secret"),
            ("WITHDRAWAL_MIN_TOTAL", "25"),
            ("LEDGER_MAX_COMMIT_ATTEMPTS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.eligibility_policy().min_total.as_decimal(), dec!(25.00));
        assert_eq!(config.retry_policy().max_attempts, 3);
    }
}
