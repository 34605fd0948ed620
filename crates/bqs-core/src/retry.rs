//! Retry with classified-error awareness and exponential backoff.
//!
//! The executor consults [`BqsError`] retryability to decide whether to
//! re-attempt at all, waits an explicit classification backoff when one was
//! set, and otherwise backs off exponentially. Every wait races the
//! caller's [`CancellationToken`].

use crate::error::BqsError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Exponential multiplier (typically 2.0 for doubling).
    pub multiplier: f64,
}

impl RetryConfig {
    /// Defaults for background fetches: 3 attempts, 1s base, 30s cap.
    pub fn standard() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// Faster settings for interactive, latency-sensitive paths:
    /// 2 attempts, 500ms base, 5s cap.
    pub fn quick() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }

    /// Exponential delay for a 1-based attempt number, capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = self.base_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Execute `operation` with retry according to `config`.
///
/// Non-retryable errors return immediately. After the final attempt the
/// last error's message gains a `(failed after N attempts)` suffix.
/// Cancellation during a backoff wait returns [`BqsError::cancelled`]
/// without invoking the operation again.
pub async fn with_retry<T, F, Fut>(
    token: &CancellationToken,
    config: &RetryConfig,
    operation: F,
) -> Result<T, BqsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BqsError>>,
{
    run_with_retry(token, config, None, operation).await
}

/// Callback invoked before each re-attempt: (attempt number, prior error).
pub type RetryStatusFn = dyn Fn(u32, &BqsError) + Send + Sync;

/// A named operation with retry policy and optional status feedback,
/// for surfacing "retrying..." updates without coupling to any UI.
pub struct RetryableOperation {
    pub name: String,
    pub config: RetryConfig,
    on_retry: Option<Box<RetryStatusFn>>,
}

impl RetryableOperation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: RetryConfig::standard(),
            on_retry: None,
        }
    }

    pub fn with_config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a notification callback invoked on every retry.
    pub fn on_retry(mut self, callback: impl Fn(u32, &BqsError) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Box::new(callback));
        self
    }

    pub async fn execute<T, F, Fut>(
        &self,
        token: &CancellationToken,
        operation: F,
    ) -> Result<T, BqsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BqsError>>,
    {
        run_with_retry(token, &self.config, self.on_retry.as_deref(), operation).await
    }
}

async fn run_with_retry<T, F, Fut>(
    token: &CancellationToken,
    config: &RetryConfig,
    notify: Option<&RetryStatusFn>,
    mut operation: F,
) -> Result<T, BqsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BqsError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_err: Option<BqsError> = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            if let (Some(notify), Some(err)) = (notify, last_err.as_ref()) {
                notify(attempt, err);
            }
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }

                if attempt < max_attempts {
                    // An explicit classification backoff is waited exactly;
                    // otherwise fall back to exponential delay.
                    let delay = match err.retry_after {
                        Some(after) if after > Duration::ZERO => after,
                        _ => config.backoff_delay(attempt),
                    };
                    debug!(
                        "attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, max_attempts, err, delay
                    );
                    wait(token, delay).await?;
                }

                last_err = Some(err);
            }
        }
    }

    let mut err = match last_err {
        Some(err) => err,
        // max_attempts >= 1 guarantees at least one operation result.
        None => BqsError::cancelled(),
    };
    err.message = format!("{} (failed after {max_attempts} attempts)", err.message);
    Err(err)
}

async fn wait(token: &CancellationToken, delay: Duration) -> Result<(), BqsError> {
    tokio::select! {
        _ = token.cancelled() => Err(BqsError::cancelled()),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{classify_bq_failure, ErrorKind, RawFailure};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn retryable_error() -> BqsError {
        classify_bq_failure(
            RawFailure::other("something odd", None),
            "get_metadata",
            "myproj",
            "mydata",
            Some("events"),
        )
    }

    fn not_found_error() -> BqsError {
        classify_bq_failure(
            RawFailure::other("not found", None),
            "get_metadata",
            "myproj",
            "mydata",
            Some("events"),
        )
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_delay_progression() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        };

        assert_eq!(config.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(4));
        // Capped at max_delay.
        assert_eq!(config.backoff_delay(10), Duration::from_secs(30));
    }

    #[test]
    fn test_presets() {
        let standard = RetryConfig::standard();
        assert_eq!(standard.max_attempts, 3);
        assert_eq!(standard.base_delay, Duration::from_secs(1));
        assert_eq!(standard.max_delay, Duration::from_secs(30));

        let quick = RetryConfig::quick();
        assert_eq!(quick.max_attempts, 2);
        assert_eq!(quick.base_delay, Duration::from_millis(500));
        assert_eq!(quick.max_delay, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let token = CancellationToken::new();
        let result = with_retry(&token, &fast_config(3), || async { Ok::<_, BqsError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_non_retryable_invoked_exactly_once() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), _> = with_retry(&token, &fast_config(5), || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(not_found_error())
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // No attempt suffix when retries never ran.
        assert!(!err.message.contains("failed after"));
    }

    #[tokio::test]
    async fn test_exhaustion_appends_attempt_count() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), _> = with_retry(&token, &fast_config(3), || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(retryable_error())
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.message.ends_with("(failed after 3 attempts)"));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = with_retry(&token, &fast_config(3), || {
            let calls = calls_clone.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(retryable_error())
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancellation_during_backoff() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        };

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let started = Instant::now();
        let result: Result<(), _> = with_retry(&token, &config, || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(retryable_error())
            }
        })
        .await;

        assert!(result.is_err());
        // Cancellation returned promptly, well under the 60s backoff.
        assert!(started.elapsed() < Duration::from_secs(5));
        // No further invocation after cancellation.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_explicit_retry_after_is_used() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        // Quota errors carry an explicit 30s backoff; confirm the executor
        // waits it rather than the (tiny) exponential schedule by checking
        // it has not completed a second attempt after a short wait.
        let config = fast_config(2);
        let token_clone = token.clone();
        let task = tokio::spawn(async move {
            with_retry(&token_clone, &config, move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(classify_bq_failure(
                        RawFailure::other("rate limit exceeded", None),
                        "list_tables",
                        "myproj",
                        "mydata",
                        None,
                    ))
                }
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        token.cancel();
        let _ = task.await;
    }

    #[tokio::test]
    async fn test_status_callback_fires_on_retries() {
        let token = CancellationToken::new();
        let notified = Arc::new(AtomicU32::new(0));
        let notified_clone = notified.clone();

        let op = RetryableOperation::new("list tables")
            .with_config(fast_config(3))
            .on_retry(move |attempt, _err| {
                notified_clone.fetch_add(attempt, Ordering::SeqCst);
            });

        let result: Result<(), _> = op
            .execute(&token, || async { Err(retryable_error()) })
            .await;

        assert!(result.is_err());
        // Called for attempts 2 and 3.
        assert_eq!(notified.load(Ordering::SeqCst), 2 + 3);
    }
}
