use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde_json::{json, Value};
use std::time::Duration;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use super::{NotificationError, UserRef, WithdrawalNotifier};
use crate::domain::WithdrawalRequest;

const EMBED_COLOR: u32 = 0xF5A623;

/// Posts new withdrawal requests to a Discord-compatible webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    breaker: CircuitBreaker,
    max_elapsed: Duration,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        breaker: CircuitBreaker,
    ) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            breaker,
            // A notification older than this is not worth delivering late
            max_elapsed: timeout.saturating_mul(4),
        })
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(250))
            .with_max_interval(Duration::from_secs(5))
            .with_multiplier(2.0)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }
}

#[async_trait]
impl WithdrawalNotifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(
        &self,
        request: &WithdrawalRequest,
        user: &UserRef,
    ) -> Result<(), NotificationError> {
        let body = payload(request, user);
        let client = &self.client;
        let url = self.url.as_str();
        let body = &body;
        let policy = self.retry_policy();

        let delivery = self
            .breaker
            .call(|| backoff::future::retry(policy, move || send_once(client, url, body)))
            .await;

        match delivery {
            Ok(()) => Ok(()),
            Err(CircuitBreakerError::Open) => Err(NotificationError::CircuitOpen),
            Err(CircuitBreakerError::OperationFailed(error)) => Err(error),
        }
    }
}

async fn send_once(
    client: &reqwest::Client,
    url: &str,
    body: &Value,
) -> Result<(), backoff::Error<NotificationError>> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| classify(NotificationError::Http(e)))?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    tracing::debug!(status = status.as_u16(), "Webhook rejected notification");
    Err(classify(NotificationError::Status(status.as_u16())))
}

/// Timeouts, connection failures, 429 and 5xx are worth another attempt
fn classify(error: NotificationError) -> backoff::Error<NotificationError> {
    let transient = match &error {
        NotificationError::Http(e) => e.is_timeout() || e.is_connect(),
        NotificationError::Status(code) => *code == 429 || *code >= 500,
        NotificationError::CircuitOpen => false,
    };
    if transient {
        backoff::Error::transient(error)
    } else {
        backoff::Error::permanent(error)
    }
}

fn payload(request: &WithdrawalRequest, user: &UserRef) -> Value {
    json!({
        "embeds": [{
            "title": "Withdrawal request",
            "color": EMBED_COLOR,
            "fields": [
                { "name": "User", "value": user.user_id, "inline": true },
                { "name": "Amount", "value": request.amount.to_string(), "inline": true },
                { "name": "Earned balance", "value": user.earned_balance.to_string(), "inline": true },
                { "name": "Request id", "value": request.id.to_string(), "inline": false },
            ],
            "timestamp": request.created_at.to_rfc3339(),
        }]
    })
}
