//! Assembles the queue, sink, retry policy, circuit breaker, error log, and
//! audit store into the message-processing protocol (C9).
//!
//! A [`Worker`] owns exactly one of each collaborator for its lifetime. The
//! retry policy, circuit breaker, error log, and audit store are optional —
//! their absence is modeled as `None`, never as a null reference. Built with
//! [`WorkerBuilder`].

mod error;

pub use error::WorkerError;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use pipeline_circuitbreaker::{CircuitBreaker, CircuitBreakerError};
use pipeline_core::{
    transform, AuditStore, CoreError, ErrorLog, ExceptionDetails, Message, MessageStatus,
    ProcessedRecord, Queue, Sink,
};
use pipeline_retry::RetryPolicy;

/// The result of a single [`Worker::process_one`] invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The main queue was empty; nothing was dequeued.
    NoWork,
    /// The message was committed to the sink.
    Completed,
    /// The message was moved to the dead-letter queue.
    Failed,
}

/// What stopped a commit from reaching the sink.
enum CommitFailure {
    CircuitOpen,
    Error(CoreError),
}

/// Builder for [`Worker`]. `queue` and `sink` are required; every other
/// collaborator defaults to absent.
#[derive(Default)]
pub struct WorkerBuilder {
    queue: Option<Arc<dyn Queue>>,
    sink: Option<Arc<dyn Sink>>,
    error_log: Option<Arc<ErrorLog>>,
    audit: Option<Arc<dyn AuditStore>>,
    retry: Option<RetryPolicy>,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl WorkerBuilder {
    pub fn queue(mut self, queue: Arc<dyn Queue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn error_log(mut self, error_log: Arc<ErrorLog>) -> Self {
        self.error_log = Some(error_log);
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditStore>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn build(self) -> Result<Worker, WorkerError> {
        Ok(Worker {
            queue: self.queue.ok_or(WorkerError::MissingQueue)?,
            sink: self.sink.ok_or(WorkerError::MissingSink)?,
            error_log: self.error_log,
            audit: self.audit,
            retry: self.retry,
            breaker: self.breaker,
        })
    }
}

/// One processing loop's worth of collaborators. Single-threaded by
/// contract: callers run at most one processing thread per `Worker`
/// instance, though the collaborators it composes all tolerate concurrent
/// access from other workers or publishers sharing the same queue/sink.
pub struct Worker {
    queue: Arc<dyn Queue>,
    sink: Arc<dyn Sink>,
    error_log: Option<Arc<ErrorLog>>,
    audit: Option<Arc<dyn AuditStore>>,
    retry: Option<RetryPolicy>,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl Worker {
    pub fn builder() -> WorkerBuilder {
        WorkerBuilder::default()
    }

    /// Dequeues and processes exactly one message. See the module
    /// documentation for the full protocol.
    pub async fn process_one(&self) -> ProcessOutcome {
        let Some(mut msg) = self.queue.dequeue().await else {
            return ProcessOutcome::NoWork;
        };

        if !msg.is_valid() {
            msg.status = MessageStatus::Failed;
            self.queue.enqueue_dlq(msg.clone()).await;
            self.log_start(msg.id).await;
            self.log_end(msg.id, false, Some("Validation failed".to_string()))
                .await;
            return ProcessOutcome::Failed;
        }

        self.log_start(msg.id).await;
        let record = transform(&msg);

        match self.commit(&msg, record).await {
            Ok(()) => {
                self.log_end(msg.id, true, None).await;
                ProcessOutcome::Completed
            }
            Err(CommitFailure::CircuitOpen) => {
                msg.status = MessageStatus::Failed;
                self.queue.enqueue_dlq(msg.clone()).await;
                self.log_error(msg.id, 0, "CircuitOpen", "circuit breaker open")
                    .await;
                self.log_end(msg.id, false, Some("Circuit breaker open".to_string()))
                    .await;
                ProcessOutcome::Failed
            }
            Err(CommitFailure::Error(e)) => {
                msg.status = MessageStatus::Failed;
                self.queue.enqueue_dlq(msg.clone()).await;
                self.log_error(msg.id, 0, "CommitFailure", &e.to_string())
                    .await;
                self.log_end(msg.id, false, Some(e.to_string())).await;
                ProcessOutcome::Failed
            }
        }
    }

    /// Calls [`Self::process_one`] at most `n` times, stopping early once the
    /// main queue drains.
    pub async fn process_up_to(&self, n: usize) -> Vec<ProcessOutcome> {
        let mut outcomes = Vec::with_capacity(n);
        for _ in 0..n {
            let outcome = self.process_one().await;
            if outcome == ProcessOutcome::NoWork {
                break;
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Reads the main queue's depth once and calls [`Self::process_one`]
    /// that many times. Messages enqueued (or DLQ'd) during the loop are
    /// deliberately not observed.
    pub async fn process_all(&self) -> Vec<ProcessOutcome> {
        let depth = self.queue.depth().await;
        let mut outcomes = Vec::with_capacity(depth);
        for _ in 0..depth {
            outcomes.push(self.process_one().await);
        }
        outcomes
    }

    /// Runs `sink.Save(record)` through `breaker(retry(..))`, whichever of
    /// the two are configured. Sets `record.status` to `Completed`
    /// immediately before the first attempt.
    async fn commit(&self, msg: &Message, mut record: ProcessedRecord) -> Result<(), CommitFailure> {
        record.status = MessageStatus::Completed;
        let msg_id = msg.id;
        let sink = Arc::clone(&self.sink);
        let error_log = self.error_log.clone();
        let attempt_counter = Arc::new(AtomicU32::new(0));

        let attempt = move || {
            let record = record.clone();
            let sink = Arc::clone(&sink);
            let error_log = error_log.clone();
            let attempt_counter = Arc::clone(&attempt_counter);
            async move {
                let attempt_no = attempt_counter.fetch_add(1, Ordering::SeqCst) + 1;
                match sink.save(record).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        if let Some(log) = &error_log {
                            let _ = log.record(
                                msg_id,
                                attempt_no,
                                &ExceptionDetails::new("TransientSinkError", e.to_string()),
                            );
                        }
                        Err(e)
                    }
                }
            }
        };

        match (&self.retry, &self.breaker) {
            (Some(retry), Some(breaker)) => {
                let retry = self.bind_retry_observer(retry, msg_id);
                breaker
                    .call_async(move || async move { retry.call_async(attempt).await })
                    .await
                    .map_err(Self::classify_breaker_error)
            }
            (Some(retry), None) => {
                let retry = self.bind_retry_observer(retry, msg_id);
                retry.call_async(attempt).await.map_err(CommitFailure::Error)
            }
            (None, Some(breaker)) => breaker
                .call_async(attempt)
                .await
                .map_err(Self::classify_breaker_error),
            (None, None) => attempt().await.map_err(CommitFailure::Error),
        }
    }

    /// Returns a copy of `retry` whose observer writes a "retry scheduled"
    /// entry to the error log before each wait.
    fn bind_retry_observer(&self, retry: &RetryPolicy, msg_id: Uuid) -> RetryPolicy {
        match &self.error_log {
            Some(log) => {
                let log = Arc::clone(log);
                retry.with_on_retry(move |attempt, _delay| {
                    let _ = log.record(
                        msg_id,
                        attempt,
                        &ExceptionDetails::new("RetryScheduled", "retry scheduled"),
                    );
                })
            }
            None => retry.clone(),
        }
    }

    fn classify_breaker_error(err: CircuitBreakerError<CoreError>) -> CommitFailure {
        match err {
            CircuitBreakerError::CircuitOpen => CommitFailure::CircuitOpen,
            CircuitBreakerError::Inner(inner) => CommitFailure::Error(inner),
            CircuitBreakerError::ArgumentError(_) => {
                unreachable!("a worker only ever holds an already-built breaker")
            }
        }
    }

    async fn log_start(&self, id: Uuid) {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_start(id).await {
                tracing::warn!(message_id = %id, error = %e, "audit log_start failed");
            }
        }
    }

    async fn log_end(&self, id: Uuid, success: bool, error_message: Option<String>) {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_end(id, success, error_message).await {
                tracing::warn!(message_id = %id, error = %e, "audit log_end failed");
            }
        }
    }

    async fn log_error(&self, id: Uuid, attempt: u32, exception_type: &str, message: &str) {
        if let Some(log) = &self.error_log {
            if let Err(e) = log.record(id, attempt, &ExceptionDetails::new(exception_type, message)) {
                tracing::warn!(message_id = %id, error = %e, "error log write failed");
            }
        }
    }
}
