//! Retry utilities for GitHub transport calls.
//!
//! Only rate-limit failures are retried. Everything above the transport sees
//! a single attempt.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

/// Initial backoff delay.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;
/// Upper bound on a single backoff delay.
pub const MAX_BACKOFF_MS: u64 = 60_000;
/// Retries before giving up on a rate-limited call.
pub const MAX_RETRIES: usize = 5;

/// Exponential backoff with jitter used for rate-limited GitHub calls.
#[must_use]
pub fn default_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(INITIAL_BACKOFF_MS))
        .with_max_delay(Duration::from_millis(MAX_BACKOFF_MS))
        .with_max_times(MAX_RETRIES)
        .with_jitter()
}

/// Execute an operation, retrying it while it fails with a rate limit.
///
/// # Example
///
/// ```ignore
/// use issuemirror::retry::with_retry;
/// use issuemirror::source::error::{SourceError, short_error_message};
///
/// let data = with_retry(
///     || async { client.post_graphql(&payload).await },
///     SourceError::is_rate_limited,
///     short_error_message,
///     "graphql",
/// )
/// .await?;
/// ```
pub async fn with_retry<T, E, F, Fut, IsRateLimit, ShortMsg>(
    operation: F,
    is_rate_limit: IsRateLimit,
    short_message: ShortMsg,
    label: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
    IsRateLimit: Fn(&E) -> bool,
    ShortMsg: Fn(&E) -> String,
{
    let mut retries = 0u32;

    operation
        .retry(default_backoff())
        .when(|err: &E| is_rate_limit(err))
        .notify(|err: &E, delay: Duration| {
            retries += 1;
            tracing::debug!(
                label,
                retry = retries,
                ?delay,
                error = %short_message(err),
                "Rate limited, backing off"
            );
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("{message}")]
    struct TestError {
        message: &'static str,
        rate_limited: bool,
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_retries_rate_limit_errors() {
        let calls = Arc::new(AtomicU32::new(0));

        // Operation: fail twice with a rate-limit error, then succeed.
        let calls_capture = Arc::clone(&calls);
        let mut operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                let n = calls_capture.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(TestError {
                        message: "rate limited",
                        rate_limited: true,
                    })
                } else {
                    Ok(42u32)
                }
            }
        };

        let advancer = tokio::spawn(async {
            // Advance time repeatedly so any backoff sleeps complete.
            for _ in 0..30 {
                tokio::time::advance(Duration::from_secs(60)).await;
                tokio::task::yield_now().await;
            }
        });

        let result = with_retry(
            &mut operation,
            |e: &TestError| e.rate_limited,
            |e: &TestError| e.to_string(),
            "graphql",
        )
        .await;

        advancer.await.expect("advancer task");

        assert_eq!(result.expect("should succeed after retries"), 42);
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn with_retry_does_not_retry_non_rate_limit_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let mut operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError {
                    message: "boom",
                    rate_limited: false,
                })
            }
        };

        let err = with_retry(
            &mut operation,
            |e: &TestError| e.rate_limited,
            |e: &TestError| e.to_string(),
            "graphql",
        )
        .await
        .expect_err("expected error");

        assert_eq!(err.to_string(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let mut operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError {
                    message: "still limited",
                    rate_limited: true,
                })
            }
        };

        let advancer = tokio::spawn(async {
            for _ in 0..60 {
                tokio::time::advance(Duration::from_millis(MAX_BACKOFF_MS)).await;
                tokio::task::yield_now().await;
            }
        });

        let err = with_retry(
            &mut operation,
            |e: &TestError| e.rate_limited,
            |e: &TestError| e.to_string(),
            "create comment",
        )
        .await
        .expect_err("should give up");
        advancer.await.expect("advancer task");

        assert_eq!(err.to_string(), "still limited");
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES as u32 + 1);
    }
}
