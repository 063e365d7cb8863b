use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use super::eligibility::{parse_amount, EligibilityPolicy};
use crate::domain::WithdrawalRequest;
use crate::errors::Result;
use crate::ledger::LedgerEngine;
use crate::notifications::{self, UserRef, WithdrawalNotifier};

/// Files withdrawal requests and forwards admin decisions to the ledger
///
/// Filing a request moves no funds. The debit happens at approval, against
/// the balance as it stands then, so several pending requests may together
/// exceed the earned balance without ever over-drawing it.
pub struct WithdrawalService {
    ledger: Arc<LedgerEngine>,
    policy: EligibilityPolicy,
    notifier: Arc<dyn WithdrawalNotifier>,
}

impl WithdrawalService {
    pub fn new(
        ledger: Arc<LedgerEngine>,
        policy: EligibilityPolicy,
        notifier: Arc<dyn WithdrawalNotifier>,
    ) -> Self {
        Self {
            ledger,
            policy,
            notifier,
        }
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    #[tracing::instrument(skip(self), fields(amount = %amount))]
    pub async fn request_withdrawal(&self, user_id: &str, amount: Decimal) -> Result<WithdrawalRequest> {
        let amount = parse_amount(amount)?;
        let balance = self.ledger.balance(user_id).await?;
        let amount = self.policy.check_request(&balance, amount.as_decimal())?;

        let request = WithdrawalRequest::pending(user_id, amount, chrono::Utc::now());
        self.ledger.store().insert_withdrawal(&request).await?;

        metrics::counter!("withdrawal_requests_total").increment(1);
        tracing::info!(request_id = %request.id, "Withdrawal request filed");

        notifications::dispatch(
            self.notifier.clone(),
            request.clone(),
            UserRef::from_balance(&balance),
        );
        Ok(request)
    }

    /// The user's requests, newest first
    pub async fn list_requests(&self, user_id: &str) -> Result<Vec<WithdrawalRequest>> {
        self.ledger.balance(user_id).await?;
        self.ledger.store().list_withdrawals(user_id).await
    }

    pub async fn approve(&self, request_id: Uuid) -> Result<WithdrawalRequest> {
        self.ledger.approve_withdrawal(request_id).await
    }

    pub async fn reject(&self, request_id: Uuid) -> Result<WithdrawalRequest> {
        self.ledger.reject_withdrawal(request_id).await
    }
}
