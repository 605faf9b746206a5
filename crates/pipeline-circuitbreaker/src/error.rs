use thiserror::Error;

/// Errors raised by [`crate::CircuitBreakerBuilder::build`] and by a
/// breaker-guarded call.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// `failure_threshold` was not positive, or `timeout` was negative.
    #[error("invalid circuit breaker configuration: {0}")]
    ArgumentError(String),

    /// The circuit is open; the action was not invoked.
    #[error("circuit is open; call not permitted")]
    CircuitOpen,

    /// The wrapped action returned an error.
    #[error("inner action failed: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::CircuitOpen)
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}
