/// Shared error types for the casino services
///
/// Design Philosophy:
/// - Standardized error codes so calling layers can map failures to user-facing
///   messages deterministically
/// - Categorized by error class (Validation, BusinessRule, Infrastructure, ...)
/// - Includes context fields for debugging (code, message, context)
///
/// Usage:
/// - The backend converts its `AppError` into a ServiceError for responses
/// - Error codes follow pattern: <CATEGORY>_<SPECIFIC>
/// - Only the Infrastructure category is eligible for caller-initiated retry
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error categories that map to HTTP status codes and logging severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Validation errors (400 Bad Request)
    /// Bad input shape, detected before any side effect
    Validation,

    /// Business-rule errors (409 Conflict)
    /// Checked atomically against current state, side-effect free
    BusinessRule,

    /// Infrastructure errors (500/503)
    /// Store unavailable, lock timeout, entropy failure
    Infrastructure,

    /// Resource not found (404 Not Found)
    NotFound,

    /// Authorization/Authentication errors (401)
    Unauthorized,
}

impl ErrorCategory {
    /// Map error category to HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCategory::Validation => 400,
            ErrorCategory::BusinessRule => 409,
            ErrorCategory::Infrastructure => 503,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Unauthorized => 401,
        }
    }

    /// Map error category to log level
    pub fn log_level(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "warn",
            ErrorCategory::BusinessRule => "info",
            ErrorCategory::Infrastructure => "error",
            ErrorCategory::NotFound => "info",
            ErrorCategory::Unauthorized => "warn",
        }
    }

    /// Whether a caller may retry the whole operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Infrastructure)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Validation => "Validation",
            ErrorCategory::BusinessRule => "BusinessRule",
            ErrorCategory::Infrastructure => "Infrastructure",
            ErrorCategory::NotFound => "NotFound",
            ErrorCategory::Unauthorized => "Unauthorized",
        };
        f.write_str(name)
    }
}

/// Standard error codes used across all services
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    // Validation errors
    pub const VALIDATION_INVALID_BET: ErrorCode = ErrorCode("VALIDATION_INVALID_BET");
    pub const VALIDATION_INVALID_AMOUNT: ErrorCode = ErrorCode("VALIDATION_INVALID_AMOUNT");
    pub const VALIDATION_INVALID_INPUT: ErrorCode = ErrorCode("VALIDATION_INVALID_INPUT");
    pub const VALIDATION_MISSING_FIELD: ErrorCode = ErrorCode("VALIDATION_MISSING_FIELD");

    // Business-rule errors
    pub const LEDGER_INSUFFICIENT_FUNDS: ErrorCode = ErrorCode("LEDGER_INSUFFICIENT_FUNDS");
    pub const LEDGER_INSUFFICIENT_EARNED: ErrorCode = ErrorCode("LEDGER_INSUFFICIENT_EARNED");
    pub const WITHDRAWAL_NOT_ELIGIBLE: ErrorCode = ErrorCode("WITHDRAWAL_NOT_ELIGIBLE");
    pub const WITHDRAWAL_EXCEEDS_EARNED: ErrorCode = ErrorCode("WITHDRAWAL_EXCEEDS_EARNED");
    pub const WITHDRAWAL_ALREADY_PROCESSED: ErrorCode =
        ErrorCode("WITHDRAWAL_ALREADY_PROCESSED");

    // Infrastructure errors
    pub const INFRA_LOCK_TIMEOUT: ErrorCode = ErrorCode("INFRA_LOCK_TIMEOUT");
    pub const INFRA_CONFLICT: ErrorCode = ErrorCode("INFRA_CONFLICT");
    pub const INFRA_ENTROPY: ErrorCode = ErrorCode("INFRA_ENTROPY");
    pub const INFRA_REDIS: ErrorCode = ErrorCode("INFRA_REDIS");
    pub const INFRA_DATABASE: ErrorCode = ErrorCode("INFRA_DATABASE");
    pub const INFRA_INTERNAL: ErrorCode = ErrorCode("INFRA_INTERNAL");

    // Resource errors
    pub const NOT_FOUND_ACCOUNT: ErrorCode = ErrorCode("NOT_FOUND_ACCOUNT");
    pub const NOT_FOUND_WITHDRAWAL: ErrorCode = ErrorCode("NOT_FOUND_WITHDRAWAL");

    // Authorization errors
    pub const UNAUTHORIZED: ErrorCode = ErrorCode("UNAUTHORIZED");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Standardized error structure used across all services
///
/// This provides consistent error reporting with:
/// - Structured error codes for programmatic handling
/// - Human-readable messages
/// - Optional context for debugging
/// - Category-based classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceError {
    /// Error category (determines status code and log level)
    pub category: ErrorCategory,

    /// Structured error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context (e.g., amounts, IDs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ServiceError {
    /// Create a new ServiceError
    pub fn new(category: ErrorCategory, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.as_str().to_string(),
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "[{}] {}: {}", self.code, self.message, context)
        } else {
            write!(f, "[{}] {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ServiceError {}

// Convenience type alias
pub type Result<T> = std::result::Result<T, ServiceError>;
