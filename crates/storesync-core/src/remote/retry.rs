//! Rate-limit-aware execution of single remote calls.
//!
//! Only HTTP 429 responses are retried. Every other failure surfaces on its
//! first occurrence so that callers classify it immediately.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::RemoteError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Wait used when the response carries no usable `Retry-After`
    pub default_wait: Duration,
    /// Upper bound on any single wait
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_wait: DEFAULT_RATE_LIMIT_WAIT,
            max_wait: MAX_RATE_LIMIT_WAIT,
        }
    }
}

impl RetryPolicy {
    pub fn wait_for(&self, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or(self.default_wait).min(self.max_wait)
    }
}

/// `min(retry_after, 60s)`, or 60s when the remote gave no hint.
pub fn rate_limit_wait(retry_after: Option<Duration>) -> Duration {
    RetryPolicy::default().wait_for(retry_after)
}

/// Runs one remote call with bounded retry on rate limiting.
#[derive(Debug, Clone, Default)]
pub struct RateLimitedExecutor {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RateLimitedExecutor {
    pub const fn new(policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { policy, cancel }
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Execute `call`, retrying only while it reports [`RemoteError::RateLimited`].
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 1;
        loop {
            if self.cancel.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }

            let result = tokio::select! {
                () = self.cancel.cancelled() => return Err(RemoteError::Cancelled),
                result = call() => result,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation, attempt, "Remote call succeeded after rate limiting");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let RemoteError::RateLimited { retry_after } = &error else {
                return Err(error);
            };

            if attempt >= self.policy.max_attempts {
                tracing::warn!(
                    operation,
                    attempts = attempt,
                    "Remote store still rate limiting after final attempt"
                );
                return Err(error);
            }

            let wait = self.policy.wait_for(*retry_after);
            tracing::warn!(
                operation,
                attempt,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "Rate limited by remote store, waiting before retry"
            );

            tokio::select! {
                () = self.cancel.cancelled() => return Err(RemoteError::Cancelled),
                () = tokio::time::sleep(wait) => {}
            }
            attempt += 1;
        }
    }
}
