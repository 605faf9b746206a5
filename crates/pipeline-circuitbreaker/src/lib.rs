//! Three-state failure-rate guard around the sink (C6).
//!
//! ```
//! use pipeline_circuitbreaker::{CircuitBreaker, CircuitState};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreaker::builder()
//!     .failure_threshold(3)
//!     .timeout(Duration::from_secs(30))
//!     .build()?;
//!
//! let result: Result<(), _> = breaker.call(|| Ok::<_, &str>(()));
//! assert!(result.is_ok());
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! # Ok(())
//! # }
//! ```

mod circuit;
mod error;

pub use circuit::CircuitState;
pub use error::CircuitBreakerError;

use std::sync::atomic::AtomicU8;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use circuit::{state_from_atomic, Circuit};

/// Mutex-guarded three-state breaker. `Reset` returns it to `Closed` with
/// the failure counter at zero. Never swallows the underlying failure: it
/// is always rethrown (wrapped in [`CircuitBreakerError::Inner`]) after the
/// breaker accounts for it.
pub struct CircuitBreaker {
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
    failure_threshold: usize,
    timeout: Duration,
}

impl CircuitBreaker {
    pub fn builder() -> CircuitBreakerBuilder {
        CircuitBreakerBuilder::default()
    }

    /// Reads the breaker's current state without contending on the mutex
    /// that guards transitions.
    pub fn state(&self) -> CircuitState {
        state_from_atomic(&self.state_atomic)
    }

    pub fn reset(&self) {
        self.circuit.lock().reset();
    }

    /// Runs `action` through the breaker, synchronously.
    pub fn call<T, E>(
        &self,
        action: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, CircuitBreakerError<E>> {
        if !self.circuit.lock().try_acquire(self.timeout) {
            tracing::debug!("circuit open; call rejected");
            return Err(CircuitBreakerError::CircuitOpen);
        }

        match action() {
            Ok(value) => {
                self.circuit.lock().on_success();
                Ok(value)
            }
            Err(err) => {
                self.circuit.lock().on_failure(self.failure_threshold);
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Async counterpart of [`Self::call`].
    pub async fn call_async<T, E, Fut>(
        &self,
        action: impl FnOnce() -> Fut,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.circuit.lock().try_acquire(self.timeout) {
            tracing::debug!("circuit open; call rejected");
            return Err(CircuitBreakerError::CircuitOpen);
        }

        match action().await {
            Ok(value) => {
                self.circuit.lock().on_success();
                Ok(value)
            }
            Err(err) => {
                self.circuit.lock().on_failure(self.failure_threshold);
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }
}

/// Builder for [`CircuitBreaker`].
pub struct CircuitBreakerBuilder {
    failure_threshold: usize,
    timeout: Duration,
}

impl Default for CircuitBreakerBuilder {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerBuilder {
    pub fn failure_threshold(mut self, failure_threshold: usize) -> Self {
        self.failure_threshold = failure_threshold;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fails with [`CircuitBreakerError::ArgumentError`] on a non-positive
    /// threshold (`timeout` is a `Duration` and so is never negative).
    pub fn build<E>(self) -> Result<CircuitBreaker, CircuitBreakerError<E>> {
        if self.failure_threshold == 0 {
            return Err(CircuitBreakerError::ArgumentError(
                "failure_threshold must be > 0".to_string(),
            ));
        }
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Ok(CircuitBreaker {
            circuit: Mutex::new(Circuit::new(Arc::clone(&state_atomic))),
            state_atomic,
            failure_threshold: self.failure_threshold,
            timeout: self.timeout,
        })
    }
}
