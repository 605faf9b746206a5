//! Message model, queue/sink/audit abstractions, and crash-recovery
//! snapshotting for the message-processing pipeline.
//!
//! This crate owns the data that flows through the pipeline (C1) and the
//! durable collaborators the worker (`pipeline-worker`) composes them with:
//! the queue abstraction (C2), the sink (C3), the pure transformer (C4), the
//! error log (C7), the audit store (C8), and the snapshot store (C10).

pub mod audit;
pub mod config;
pub mod error;
pub mod error_log;
pub mod message;
pub mod queue;
pub mod sink;
pub mod snapshot;
pub mod transform;

pub use audit::{AuditRow, AuditStatistics, AuditStatus, AuditStore, InMemoryAuditStore, SqliteAuditStore};
pub use config::PipelineConfig;
pub use error::CoreError;
pub use error_log::{ErrorLog, ExceptionDetails};
pub use message::{Message, MessageStatus, ProcessedRecord};
pub use queue::{LocalQueue, Queue};
pub use sink::{InMemorySink, Sink, SqliteSink};
pub use snapshot::SnapshotStore;
pub use transform::transform;
