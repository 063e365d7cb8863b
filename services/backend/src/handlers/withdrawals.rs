use axum::{extract::State, Json};

use crate::{
    domain::{WithdrawalRequest, WithdrawalRequestBody},
    errors::Result,
    extractors::{AuthenticatedUser, ValidatedJson},
    state::AppState,
};

pub async fn request_withdrawal(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    ValidatedJson(req): ValidatedJson<WithdrawalRequestBody>,
) -> Result<Json<WithdrawalRequest>> {
    let request = state
        .withdrawals
        .request_withdrawal(&user_id, req.amount)
        .await?;
    Ok(Json(request))
}

pub async fn list_requests(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Vec<WithdrawalRequest>>> {
    Ok(Json(state.withdrawals.list_requests(&user_id).await?))
}
