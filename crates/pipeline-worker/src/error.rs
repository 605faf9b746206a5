use thiserror::Error;

/// Errors raised by [`crate::WorkerBuilder::build`].
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("a worker requires a queue")]
    MissingQueue,

    #[error("a worker requires a sink")]
    MissingSink,
}
