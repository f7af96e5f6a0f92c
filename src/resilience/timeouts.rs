//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap downstream calls with a deadline
//! - Cancel the inner future cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors so callers can map them
//!   separately (they still count as breaker failures)

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The wrapped operation did not finish in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {}ms", .0.as_millis())]
pub struct TimeoutError(pub Duration);

/// Run `future`, giving up after `limit`.
pub async fn with_timeout<F, T>(limit: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| TimeoutError(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let result = with_timeout(Duration::from_millis(50), std::future::pending::<()>()).await;
        let err = result.unwrap_err();
        assert_eq!(err, TimeoutError(Duration::from_millis(50)));
        assert_eq!(err.to_string(), "operation timed out after 50ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_in_time() {
        let result = with_timeout(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            7
        })
        .await;
        assert_eq!(result, Ok(7));
    }
}
