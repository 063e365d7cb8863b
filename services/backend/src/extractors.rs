use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use shared::errors::{ErrorCategory, ErrorCode, ServiceError};

use crate::errors::AppError;
use crate::state::AppState;

/// Header carrying the caller identity, set by the upstream identity provider
pub const USER_ID_HEADER: &str = "x-user-id";
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

const MAX_USER_ID_LEN: usize = 128;

/// JSON extractor whose rejections use the structured error body
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ValidationJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidatedJson(value)),
            Err(rejection) => Err(ValidationJsonRejection(rejection)),
        }
    }
}

pub struct ValidationJsonRejection(JsonRejection);

impl ValidationJsonRejection {
    fn describe(&self) -> (ErrorCode, String) {
        match &self.0 {
            JsonRejection::JsonDataError(e) => {
                let detail = e.body_text();
                match missing_field(&detail) {
                    Some(field) => (
                        ErrorCode::VALIDATION_MISSING_FIELD,
                        format!("Missing required field: {}", field),
                    ),
                    None => (
                        ErrorCode::VALIDATION_INVALID_INPUT,
                        format!("Invalid request body: {}", strip_position(&detail)),
                    ),
                }
            }
            JsonRejection::JsonSyntaxError(_) => (
                ErrorCode::VALIDATION_INVALID_INPUT,
                "Invalid request body: malformed JSON".to_string(),
            ),
            JsonRejection::MissingJsonContentType(_) => (
                ErrorCode::VALIDATION_INVALID_INPUT,
                "Expected request with `Content-Type: application/json`".to_string(),
            ),
            _ => (
                ErrorCode::VALIDATION_INVALID_INPUT,
                "Invalid request body".to_string(),
            ),
        }
    }
}

impl IntoResponse for ValidationJsonRejection {
    fn into_response(self) -> Response {
        let (code, message) = self.describe();

        tracing::warn!(
            error_code = code.as_str(),
            error_message = %message,
            original_error = %self.0.body_text(),
            "Request validation failed during JSON deserialization"
        );
        metrics::counter!("errors_total", "category" => "Validation", "code" => code.as_str())
            .increment(1);

        let error = ServiceError::new(ErrorCategory::Validation, code, message);
        (StatusCode::BAD_REQUEST, Json(json!({ "error": error }))).into_response()
    }
}

fn missing_field(detail: &str) -> Option<&str> {
    detail
        .split("missing field `")
        .nth(1)
        .and_then(|rest| rest.split('`').next())
}

const DATA_ERROR_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

/// Drop the axum prefix and serde's "at line X column Y" suffix
fn strip_position(detail: &str) -> &str {
    let detail = detail.strip_prefix(DATA_ERROR_PREFIX).unwrap_or(detail);
    detail.split(" at line").next().unwrap_or(detail).trim()
}

/// Caller identity taken from the trusted `x-user-id` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized("missing user identity".to_string()))?;

        if user_id.len() > MAX_USER_ID_LEN {
            return Err(AppError::InvalidInput("user id is too long".to_string()));
        }
        Ok(AuthenticatedUser(user_id.to_string()))
    }
}

/// Proof that the request carried the configured admin key
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

#[async_trait]
impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing admin key".to_string()))?;

        if !keys_match(provided, &state.config.admin_api_key) {
            tracing::warn!("Rejected admin request with wrong key");
            return Err(AppError::Unauthorized("invalid admin key".to_string()));
        }
        Ok(AdminAccess)
    }
}

/// Comparison time depends only on the lengths
fn keys_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
