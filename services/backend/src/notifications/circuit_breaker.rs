use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Stops calling a failing endpoint until `reset_timeout` has passed
///
/// After the timeout one trial call is let through (half-open); its result
/// closes or re-opens the circuit.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(CircuitState::Open)
    }

    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            return Err(CircuitBreakerError::Open);
        }

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(error) => {
                self.on_failure();
                Err(CircuitBreakerError::OperationFailed(error))
            }
        }
    }

    /// Whether a call may go through right now
    fn try_acquire(&self) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        match inner.state {
            CircuitState::Closed => true,
            // One trial call is already in flight
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.reset_timeout)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    tracing::info!("Notification circuit half-open, sending trial call");
                }
                elapsed
            }
        }
    }

    fn on_success(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.state != CircuitState::Closed {
                tracing::info!("Notification circuit closed");
            }
            inner.state = CircuitState::Closed;
            inner.consecutive_failures = 0;
            inner.opened_at = None;
        }
    }

    fn on_failure(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
            let reopen = inner.state == CircuitState::HalfOpen;
            if reopen || inner.consecutive_failures >= self.failure_threshold {
                if inner.state != CircuitState::Open {
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        "Notification circuit opened"
                    );
                }
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit breaker is open")]
    Open,

    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fail(breaker: &CircuitBreaker) -> Result<(), CircuitBreakerError<&'static str>> {
        breaker.call(|| async { Err::<(), _>("boom") }).await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<u8, CircuitBreakerError<&'static str>> {
        breaker.call(|| async { Ok::<_, &'static str>(7) }).await
    }

    #[tokio::test]
    async fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        assert!(matches!(fail(&breaker).await, Err(CircuitBreakerError::OperationFailed(_))));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(fail(&breaker).await.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(matches!(succeed(&breaker).await, Err(CircuitBreakerError::Open)));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        assert!(fail(&breaker).await.is_err());
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert!(fail(&breaker).await.is_err());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_trial_closes_or_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        assert!(fail(&breaker).await.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(fail(&breaker).await, Err(CircuitBreakerError::OperationFailed(_))));
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
