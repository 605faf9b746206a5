use thiserror::Error;

/// Errors raised by [`crate::RetryPolicyBuilder::build`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// `max_retries` was negative.
    #[error("max_retries must be >= 0, got {0}")]
    ArgumentError(i64),
}
