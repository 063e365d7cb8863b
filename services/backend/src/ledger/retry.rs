//! Bounded retry of optimistic ledger commits
//!
//! Stores that detect concurrent modification at commit time report
//! `Conflict`; the whole read-check-commit cycle is then repeated with the
//! same inputs. Game draws are inputs, so a retry never re-rolls a result.

use std::time::Duration;

use shared::DEFAULT_MAX_COMMIT_ATTEMPTS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitRetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for CommitRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            base_backoff_ms: 5,
            max_backoff_ms: 100,
        }
    }
}

impl CommitRetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before the attempt following `failed_attempt` (1-indexed)
    ///
    /// base * 2^(n-1), capped at the maximum.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let n = failed_attempt.max(1);
        let factor = 2_u64.saturating_pow(n - 1);
        Duration::from_millis(
            self.base_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}
