use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shared::errors::{ErrorCategory, ErrorCode, ServiceError};
use shared::SxAmount;
use uuid::Uuid;

use crate::domain::WithdrawalStatus;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Validation
    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Business rules
    #[error("Insufficient funds: bet {required} exceeds balance {available}")]
    InsufficientFunds {
        required: SxAmount,
        available: SxAmount,
    },

    #[error("Insufficient earned balance: {required} requested, {available} earned")]
    InsufficientEarnedBalance {
        required: SxAmount,
        available: SxAmount,
    },

    #[error("Not eligible for withdrawal: total {total} and earned {earned} must both reach the minimum")]
    NotEligible { total: SxAmount, earned: SxAmount },

    #[error("Withdrawal of {requested} exceeds earned balance {earned}")]
    ExceedsEarned {
        requested: SxAmount,
        earned: SxAmount,
    },

    #[error("Withdrawal request {id} already processed ({status})")]
    AlreadyProcessed { id: Uuid, status: WithdrawalStatus },

    // Lookups
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Withdrawal request not found: {0}")]
    WithdrawalNotFound(Uuid),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Infrastructure
    #[error("Timed out waiting for the ledger lock of {0}")]
    LockTimeout(String),

    #[error("Ledger of {0} was modified concurrently")]
    Conflict(String),

    #[error("Entropy source failure: {0}")]
    Entropy(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::InvalidBet(_) | AppError::InvalidAmount(_) | AppError::InvalidInput(_) => {
                ErrorCategory::Validation
            }
            AppError::InsufficientFunds { .. }
            | AppError::InsufficientEarnedBalance { .. }
            | AppError::NotEligible { .. }
            | AppError::ExceedsEarned { .. }
            | AppError::AlreadyProcessed { .. } => ErrorCategory::BusinessRule,
            AppError::AccountNotFound(_) | AppError::WithdrawalNotFound(_) => ErrorCategory::NotFound,
            AppError::Unauthorized(_) => ErrorCategory::Unauthorized,
            AppError::LockTimeout(_)
            | AppError::Conflict(_)
            | AppError::Entropy(_)
            | AppError::Database(_)
            | AppError::Redis(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => ErrorCategory::Infrastructure,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidBet(_) => ErrorCode::VALIDATION_INVALID_BET,
            AppError::InvalidAmount(_) => ErrorCode::VALIDATION_INVALID_AMOUNT,
            AppError::InvalidInput(_) => ErrorCode::VALIDATION_INVALID_INPUT,
            AppError::InsufficientFunds { .. } => ErrorCode::LEDGER_INSUFFICIENT_FUNDS,
            AppError::InsufficientEarnedBalance { .. } => ErrorCode::LEDGER_INSUFFICIENT_EARNED,
            AppError::NotEligible { .. } => ErrorCode::WITHDRAWAL_NOT_ELIGIBLE,
            AppError::ExceedsEarned { .. } => ErrorCode::WITHDRAWAL_EXCEEDS_EARNED,
            AppError::AlreadyProcessed { .. } => ErrorCode::WITHDRAWAL_ALREADY_PROCESSED,
            AppError::AccountNotFound(_) => ErrorCode::NOT_FOUND_ACCOUNT,
            AppError::WithdrawalNotFound(_) => ErrorCode::NOT_FOUND_WITHDRAWAL,
            AppError::Unauthorized(_) => ErrorCode::UNAUTHORIZED,
            AppError::LockTimeout(_) => ErrorCode::INFRA_LOCK_TIMEOUT,
            AppError::Conflict(_) => ErrorCode::INFRA_CONFLICT,
            AppError::Entropy(_) => ErrorCode::INFRA_ENTROPY,
            AppError::Database(_) => ErrorCode::INFRA_DATABASE,
            AppError::Redis(_) => ErrorCode::INFRA_REDIS,
            AppError::Serialization(_) | AppError::Internal(_) => ErrorCode::INFRA_INTERNAL,
        }
    }

    /// Only infrastructure failures may be retried unchanged by the caller
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_)
            | AppError::Redis(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            other => StatusCode::from_u16(other.category().status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Structured form handed to callers
    ///
    /// Store and driver errors are summarized; their detail only goes to the log.
    pub fn to_service_error(&self) -> ServiceError {
        let message = match self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Redis(_) => "Cache error".to_string(),
            AppError::Serialization(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let error = ServiceError::new(self.category(), self.code(), message);

        match self {
            AppError::InsufficientFunds {
                required,
                available,
            }
            | AppError::InsufficientEarnedBalance {
                required,
                available,
            } => error.with_context(format!(
                "required: {}, available: {}",
                required.as_decimal(),
                available.as_decimal()
            )),
            AppError::NotEligible { total, earned } => error.with_context(format!(
                "total: {}, earned: {}",
                total.as_decimal(),
                earned.as_decimal()
            )),
            AppError::ExceedsEarned { requested, earned } => error.with_context(format!(
                "requested: {}, earned: {}",
                requested.as_decimal(),
                earned.as_decimal()
            )),
            AppError::AlreadyProcessed { id, status } => {
                error.with_context(format!("request: {}, status: {}", id, status))
            }
            _ => error,
        }
    }
}

impl From<AppError> for ServiceError {
    fn from(error: AppError) -> Self {
        error.to_service_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.to_service_error();

        match self.category() {
            ErrorCategory::Infrastructure => {
                tracing::error!(error_code = %error.code, error = ?self, "Request failed");
            }
            ErrorCategory::Validation | ErrorCategory::Unauthorized => {
                tracing::warn!(error_code = %error.code, error = %self, "Request rejected");
            }
            ErrorCategory::BusinessRule | ErrorCategory::NotFound => {
                tracing::info!(error_code = %error.code, error = %self, "Request refused");
            }
        }

        metrics::counter!(
            "errors_total",
            "category" => error.category.to_string(),
            "code" => error.code.clone()
        )
        .increment(1);

        (status, Json(json!({ "error": error }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
