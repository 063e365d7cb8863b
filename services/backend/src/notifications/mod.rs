//! Outbound notification of new withdrawal requests
//!
//! Delivery is fire-and-forget: it runs on its own task after the request
//! is stored, and a failure is logged and counted but never reaches the
//! caller or the ledger.

pub mod circuit_breaker;
pub mod webhook;

use async_trait::async_trait;
use shared::SxAmount;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::domain::{Balance, WithdrawalRequest};

pub use webhook::WebhookNotifier;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook responded with status {0}")]
    Status(u16),

    #[error("Notification circuit is open")]
    CircuitOpen,
}

/// The user a request belongs to, as seen when it was filed
#[derive(Debug, Clone, PartialEq)]
pub struct UserRef {
    pub user_id: String,
    pub total_balance: SxAmount,
    pub earned_balance: SxAmount,
}

impl UserRef {
    pub fn from_balance(balance: &Balance) -> Self {
        Self {
            user_id: balance.user_id.clone(),
            total_balance: balance.total_balance,
            earned_balance: balance.earned_balance,
        }
    }
}

#[async_trait]
pub trait WithdrawalNotifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(
        &self,
        request: &WithdrawalRequest,
        user: &UserRef,
    ) -> Result<(), NotificationError>;
}

/// Send the notification on a background task
pub fn dispatch(notifier: Arc<dyn WithdrawalNotifier>, request: WithdrawalRequest, user: UserRef) {
    tokio::spawn(async move {
        match notifier.notify(&request, &user).await {
            Ok(()) => {
                tracing::debug!(request_id = %request.id, channel = notifier.name(), "Withdrawal notification sent");
            }
            Err(error) => {
                metrics::counter!("notifications_failed_total", "channel" => notifier.name())
                    .increment(1);
                tracing::warn!(
                    request_id = %request.id,
                    channel = notifier.name(),
                    error = %error,
                    "Withdrawal notification failed"
                );
            }
        }
    });
}

/// Writes the notification to the log only; used when no webhook is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl WithdrawalNotifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(
        &self,
        request: &WithdrawalRequest,
        user: &UserRef,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            request_id = %request.id,
            user_id = %user.user_id,
            amount = %request.amount.as_decimal(),
            earned = %user.earned_balance.as_decimal(),
            "New withdrawal request awaiting review"
        );
        Ok(())
    }
}

/// Keeps the ids of every request it was told about, for tests
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Uuid>>,
    notify: Notify,
}

impl RecordingNotifier {
    pub fn delivered(&self) -> Vec<Uuid> {
        self.delivered
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Wait until at least `count` notifications arrived or `timeout` passed
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Uuid> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let delivered = self.delivered();
            if delivered.len() >= count {
                return delivered;
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return self.delivered();
            }
        }
    }
}

#[async_trait]
impl WithdrawalNotifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(
        &self,
        request: &WithdrawalRequest,
        _user: &UserRef,
    ) -> Result<(), NotificationError> {
        if let Ok(mut ids) = self.delivered.lock() {
            ids.push(request.id);
        }
        self.notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    struct FailingNotifier;

    #[async_trait]
    impl WithdrawalNotifier for FailingNotifier {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn notify(&self, _: &WithdrawalRequest, _: &UserRef) -> Result<(), NotificationError> {
            Err(NotificationError::Status(502))
        }
    }

    fn request() -> (WithdrawalRequest, UserRef) {
        let amount = SxAmount::new(dec!(10)).unwrap();
        let balance = Balance::opening("alice", amount, Utc::now());
        (
            WithdrawalRequest::pending("alice", amount, Utc::now()),
            UserRef::from_balance(&balance),
        )
    }

    #[tokio::test]
    async fn test_dispatch_delivers_in_background() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (request, user) = request();
        dispatch(notifier.clone(), request.clone(), user);

        let delivered = notifier.wait_for(1, Duration::from_secs(1)).await;
        assert_eq!(delivered, vec![request.id]);
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let (request, user) = request();
        dispatch(Arc::new(FailingNotifier), request, user);
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let (request, user) = request();
        assert!(LogNotifier.notify(&request, &user).await.is_ok());
    }
}
