//! Error taxonomy shared by the queue, sink, audit store, and snapshot store.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the core collaborators (C2/C3/C7/C8/C10).
#[derive(Debug, Error)]
pub enum CoreError {
    /// `Enqueue` was called with an id already resident in the main queue.
    #[error("message {0} is already enqueued")]
    DuplicateMessage(Uuid),

    /// `Sink::save` was called twice with the same id.
    #[error("a record for message {0} already exists in the sink")]
    DuplicateKey(Uuid),

    /// A durable-store failure from the sink or audit store that the caller
    /// must classify (transient vs. fatal); never silently swallowed.
    #[error("store error: {0}")]
    Store(String),

    /// `Audit::log_start` was called for an id that already has a row.
    #[error("audit row for message {0} already exists")]
    AuditRowExists(Uuid),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
