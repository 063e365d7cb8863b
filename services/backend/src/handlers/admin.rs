use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    domain::{AuditReport, GrantBonusRequest, GrantBonusResponse, WithdrawalRequest},
    errors::{AppError, Result},
    extractors::{AdminAccess, ValidatedJson},
    state::AppState,
    withdrawals::eligibility::parse_amount,
};

const DEFAULT_BONUS_SOURCE: &str = "admin";

pub async fn approve_withdrawal(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Path(request_id): Path<Uuid>,
) -> Result<Json<WithdrawalRequest>> {
    Ok(Json(state.withdrawals.approve(request_id).await?))
}

pub async fn reject_withdrawal(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Path(request_id): Path<Uuid>,
) -> Result<Json<WithdrawalRequest>> {
    Ok(Json(state.withdrawals.reject(request_id).await?))
}

pub async fn grant_bonus(
    State(state): State<AppState>,
    _admin: AdminAccess,
    ValidatedJson(req): ValidatedJson<GrantBonusRequest>,
) -> Result<Json<GrantBonusResponse>> {
    let amount = parse_amount(req.amount)?;
    let source = req
        .source
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_BONUS_SOURCE);

    let balance = state.ledger.credit_bonus(&req.user_id, amount, source).await?;
    tracing::info!(user_id = %req.user_id, source, "Admin bonus granted");

    Ok(Json(GrantBonusResponse {
        user_id: balance.user_id,
        new_balance: balance.total_balance,
    }))
}

pub async fn audit_user(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Path(user_id): Path<String>,
) -> Result<Json<AuditReport>> {
    if user_id.trim().is_empty() {
        return Err(AppError::InvalidInput("user id must not be empty".to_string()));
    }
    Ok(Json(state.ledger.audit(&user_id).await?))
}
