//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::TurnError;

/// Run `future`, failing with [`TurnError::Timeout`] once `duration` elapses.
///
/// The future is dropped on expiry.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, TurnError>>,
) -> Result<T, TurnError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(TurnError::Timeout(duration.as_millis() as u64)),
    }
}

/// Like [`with_timeout`], but a zero duration waits forever.
pub async fn with_optional_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, TurnError>>,
) -> Result<T, TurnError> {
    if duration.is_zero() {
        future.await
    } else {
        with_timeout(duration, future).await
    }
}
