use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// The state of a [`crate::CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Every call executes.
    Closed = 0,
    /// Every call fails immediately with `CircuitOpen`, without invoking
    /// the action, until `timeout` has elapsed since the last failure.
    Open = 1,
    /// Exactly one call is admitted to probe whether the dependency has
    /// recovered.
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Closed,
            1 => Self::Open,
            _ => Self::HalfOpen,
        }
    }
}

/// Mutex-guarded breaker state: `(state, failure_count, last_failure_time)`.
///
/// All transitions happen under the caller's lock; `state_atomic` mirrors
/// the current state so [`crate::CircuitBreaker::state`] can be read without
/// contending on that lock.
pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: std::sync::Arc<AtomicU8>,
    failure_count: usize,
    last_failure_time: Option<Instant>,
}

impl Circuit {
    pub(crate) fn new(state_atomic: std::sync::Arc<AtomicU8>) -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic,
            failure_count: 0,
            last_failure_time: None,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    fn set_state(&mut self, state: CircuitState) {
        self.state = state;
        self.state_atomic.store(state as u8, Ordering::SeqCst);
    }

    /// `Closed`/`HalfOpen`: is a call permitted right now, transitioning
    /// `Open` → `HalfOpen` first if the timeout has elapsed?
    pub(crate) fn try_acquire(&mut self, timeout: Duration) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => false, // one probe already in flight
            CircuitState::Open => {
                let elapsed = self
                    .last_failure_time
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= timeout {
                    self.set_state(CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub(crate) fn on_success(&mut self) {
        match self.state {
            CircuitState::HalfOpen => {
                self.failure_count = 0;
                self.set_state(CircuitState::Closed);
            }
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub(crate) fn on_failure(&mut self, failure_threshold: usize) {
        self.last_failure_time = Some(Instant::now());
        match self.state {
            CircuitState::HalfOpen => {
                self.failure_count += 1;
                self.set_state(CircuitState::Open);
            }
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= failure_threshold {
                    self.set_state(CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub(crate) fn reset(&mut self) {
        self.failure_count = 0;
        self.last_failure_time = None;
        self.set_state(CircuitState::Closed);
    }
}

pub(crate) fn state_from_atomic(atomic: &AtomicU8) -> CircuitState {
    CircuitState::from_u8(atomic.load(Ordering::SeqCst))
}
