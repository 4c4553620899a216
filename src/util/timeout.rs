//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::CineError;

/// Wrap a future with a timeout. Expiry drops the inner future, which
/// cancels whatever request it was driving.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, CineError>>,
) -> Result<T, CineError> {
    match tokio::time::timeout(duration, future).await {
        Ok(Err(CineError::Timeout(0))) => Err(CineError::Timeout(duration.as_millis() as u64)),
        Ok(result) => result,
        Err(_) => Err(CineError::Timeout(duration.as_millis() as u64)),
    }
}
