//! Retry, timeout and error-context helpers
//!
//! The client never blocks its event loop on a retry: socket reconnection
//! only borrows [`RetryConfig::reconnect`] to space out its timer-driven
//! attempts. [`retry_with_backoff`] is for application code driving the
//! client (re-dialing after `SocketNotConnected`, for instance), and
//! [`with_timeout`] bounds every call into a media engine.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

/// Backoff schedule for repeated attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts in total, the first one included
    pub max_attempts: u32,
    /// Wait after the first failure
    pub initial_delay: Duration,
    /// Ceiling for any single wait
    pub max_delay: Duration,
    /// Growth factor between consecutive waits
    pub backoff_multiplier: f64,
    /// Spread each wait by up to 10% either way
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Short waits for interactive operations
    pub fn quick() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 1.5,
            ..Self::default()
        }
    }

    /// Long, deterministic waits for server-side operations
    pub fn slow() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 3.0,
            use_jitter: false,
            ..Self::default()
        }
    }

    /// Socket reconnection; the reconnect timeout bounds the attempts instead
    pub fn reconnect() -> Self {
        Self {
            max_attempts: u32::MAX,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// Wait after failed attempt number `attempt`, counting from 1
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let steps = attempt.saturating_sub(1).min(32) as i32;
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(steps);
        let capped = base.min(self.max_delay.as_secs_f64());
        let factor = if self.use_jitter { 1.0 + (rand::random::<f64>() - 0.5) * 0.2 } else { 1.0 };
        Duration::from_secs_f64((capped * factor).max(0.0))
    }
}

/// Run `operation` until it succeeds, fails for good, or runs out of attempts.
///
/// Only [recoverable](ClientError::is_recoverable) errors are retried; the
/// last error is returned unchanged.
pub async fn retry_with_backoff<T, F, Fut>(operation_name: &str, config: RetryConfig, mut operation: F) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    let mut attempt = 1;
    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt = attempt, "Succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_recoverable() || attempt >= config.max_attempts {
            warn!(
                operation = operation_name,
                attempts = attempt,
                category = error.category(),
                error = %error,
                "Giving up"
            );
            return Err(error);
        }

        let delay = config.delay_for_attempt(attempt);
        debug!(
            operation = operation_name,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Wrap a failure with a description of what was being attempted
pub trait ErrorContext<T> {
    fn context(self, context: &str) -> ClientResult<T>;

    /// Like [`context`](Self::context), building the text only on failure
    fn with_context<F>(self, f: F) -> ClientResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ErrorContext<T> for ClientResult<T> {
    fn context(self, context: &str) -> ClientResult<T> {
        self.with_context(|| context.to_string())
    }

    fn with_context<F>(self, f: F) -> ClientResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ClientError::internal_error(format!("{}: {}", f(), e)))
    }
}

/// Run `future`, failing with [`ClientError::OperationTimeout`] after `timeout`
pub async fn with_timeout<T, F>(operation_name: &str, timeout: Duration, future: F) -> ClientResult<T>
where
    F: Future<Output = ClientResult<T>>,
{
    let duration_ms = timeout.as_millis() as u64;
    tokio::time::timeout(timeout, future).await.unwrap_or_else(|_| {
        warn!(operation = operation_name, timeout_ms = duration_ms, "Timed out");
        Err(ClientError::OperationTimeout { duration_ms })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let calls = AtomicU32::new(0);

        let result = retry_with_backoff("flaky", RetryConfig::quick(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ClientError::transport_failed("connection reset"))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_configuration_errors_fail_immediately() {
        let calls = AtomicU32::new(0);

        let result: ClientResult<()> = retry_with_backoff("misconfigured", RetryConfig::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::invalid_configuration("server", "empty host"))
        })
        .await;

        assert!(matches!(result, Err(ClientError::InvalidConfiguration { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_error_returned_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig { max_attempts: 2, ..RetryConfig::default() };

        let result: ClientResult<()> = retry_with_backoff("offline", config, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::SocketNotConnected)
        })
        .await;

        assert_eq!(result, Err(ClientError::SocketNotConnected));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_grows_then_caps() {
        let config = RetryConfig::slow();
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(9));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(60));

        for _ in 0..20 {
            let jittered = RetryConfig::reconnect().delay_for_attempt(1);
            assert!(jittered >= Duration::from_millis(900) && jittered <= Duration::from_millis(1100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout() {
        let result: ClientResult<()> = with_timeout("stuck", Duration::from_millis(250), std::future::pending()).await;
        assert_eq!(result, Err(ClientError::OperationTimeout { duration_ms: 250 }));

        let result = with_timeout("fast", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn test_error_context_wraps_as_internal() {
        let result: ClientResult<()> = Err(ClientError::SocketNotConnected);
        let err = result.context("sending invite").unwrap_err();
        assert_eq!(err, ClientError::internal_error("sending invite: Socket is not connected"));
    }
}
