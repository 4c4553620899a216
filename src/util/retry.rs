//! Retry with capped exponential backoff.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::{DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_CAP, DEFAULT_RETRY_BUDGET};
use crate::error::{CineError, ErrorKind};

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_BUDGET,
            base_delay: DEFAULT_BACKOFF_BASE,
            max_delay: DEFAULT_BACKOFF_CAP,
        }
    }
}

/// Bookkeeping for one logical request.
#[derive(Debug, Clone)]
pub struct RetryState {
    pub attempt: u32,
    pub started_at: Instant,
    pub last_error: Option<ErrorKind>,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt: 0,
            started_at: Instant::now(),
            last_error: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl RetryPolicy {
    /// Same policy with a different attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Wait inserted after failed attempt `attempt` (1-based):
    /// `min(base * 2^(attempt-1), cap)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1)) as f64;
        let scaled = self.base_delay.as_secs_f64() * multiplier;
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    /// Execute an async operation with retry.
    ///
    /// The closure receives the 1-based attempt number. Only transient errors
    /// are retried; anything else is returned as-is. Running out of attempts
    /// on a transient error yields [`CineError::RetriesExhausted`].
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, CineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CineError>>,
    {
        if self.max_attempts == 0 {
            return Err(CineError::InvalidArgument(
                "retry budget must be at least 1".into(),
            ));
        }

        let mut state = RetryState::new();
        loop {
            state.attempt += 1;
            let error = match operation(state.attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() {
                return Err(error);
            }
            state.last_error = Some(error.kind());

            if state.attempt >= self.max_attempts {
                tracing::warn!(
                    attempts = state.attempt,
                    elapsed_ms = state.elapsed().as_millis() as u64,
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(CineError::RetriesExhausted {
                    attempts: state.attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.delay_for(state.attempt);
            tracing::warn!(
                attempt = state.attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after error"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
