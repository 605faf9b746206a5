//! Bounded retry with exponential back-off and an observer hook (C5).
//!
//! # Examples
//!
//! ```
//! use pipeline_retry::RetryPolicy;
//!
//! # fn example() -> Result<(), pipeline_retry::RetryError> {
//! let policy = RetryPolicy::builder().max_retries(3).build()?;
//! let mut calls = 0;
//! let result: Result<(), &str> = policy.call(|| {
//!     calls += 1;
//!     if calls < 2 { Err("transient") } else { Ok(()) }
//! });
//! assert!(result.is_ok());
//! assert_eq!(calls, 2);
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::RetryError;

use std::sync::Arc;
use std::time::Duration;

/// A function invoked before each sleep between retries.
///
/// `attempt` is the 1-based index of the upcoming retry; `delay` is the
/// interval the policy is about to sleep for.
pub type OnRetry = Arc<dyn Fn(u32, Duration) + Send + Sync>;

/// Stateless policy describing how many times to retry a fallible
/// operation and how long to wait between attempts.
///
/// The operation is invoked at most `max_retries + 1` times. On the final
/// failing attempt the underlying error is surfaced unchanged — the policy
/// never substitutes its own error for the operation's.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    on_retry: Option<OnRetry>,
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Runs `operation` synchronously, sleeping the calling thread between
    /// attempts. Identical in outcome and in observer callbacks to
    /// [`RetryPolicy::call_async`]; only the waiting primitive differs.
    pub fn call<T, E>(&self, mut operation: impl FnMut() -> Result<T, E>) -> Result<T, E> {
        let mut invocation: u32 = 0;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if invocation >= self.max_retries {
                        return Err(err);
                    }
                    let delay = backoff_delay(invocation);
                    let attempt = invocation + 1;
                    if let Some(cb) = &self.on_retry {
                        cb(attempt, delay);
                    }
                    tracing::debug!(attempt, delay_secs = delay.as_secs(), "retry scheduled");
                    std::thread::sleep(delay);
                    invocation += 1;
                }
            }
        }
    }

    /// Async counterpart of [`RetryPolicy::call`], sleeping via
    /// `tokio::time::sleep` instead of blocking the thread.
    pub async fn call_async<T, E, Fut>(
        &self,
        mut operation: impl FnMut() -> Fut,
    ) -> Result<T, E>
    where
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut invocation: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if invocation >= self.max_retries {
                        return Err(err);
                    }
                    let delay = backoff_delay(invocation);
                    let attempt = invocation + 1;
                    if let Some(cb) = &self.on_retry {
                        cb(attempt, delay);
                    }
                    tracing::debug!(attempt, delay_secs = delay.as_secs(), "retry scheduled");
                    tokio::time::sleep(delay).await;
                    invocation += 1;
                }
            }
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns a copy of this policy with its observer replaced by `f`.
    ///
    /// Lets a caller bind per-call context (a message id, say) into the
    /// observer without threading it through [`Self::call`]/[`Self::call_async`].
    pub fn with_on_retry<F>(&self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        Self {
            max_retries: self.max_retries,
            on_retry: Some(Arc::new(f)),
        }
    }
}

/// `2^attempt` seconds, `attempt` being the zero-based invocation count that
/// just failed (so the first retry waits 1s, the second 2s, and so on).
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Builder for [`RetryPolicy`].
#[derive(Default)]
pub struct RetryPolicyBuilder {
    max_retries: Option<i64>,
    on_retry: Option<OnRetry>,
}

impl RetryPolicyBuilder {
    pub fn max_retries(mut self, max_retries: i64) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(f));
        self
    }

    /// Fails with [`RetryError::ArgumentError`] if `max_retries < 0`.
    pub fn build(self) -> Result<RetryPolicy, RetryError> {
        let max_retries = self.max_retries.unwrap_or(0);
        if max_retries < 0 {
            return Err(RetryError::ArgumentError(max_retries));
        }
        Ok(RetryPolicy {
            max_retries: max_retries as u32,
            on_retry: self.on_retry,
        })
    }
}
