//! Scenario 2 (spec §8): an invalid message is DLQ'd without touching the
//! sink, no retry.

use std::sync::Arc;

use pipeline_core::{AuditStatus, Message, Queue, Sink};
use pipeline_worker::ProcessOutcome;

use crate::support::worker_with;

#[tokio::test]
async fn invalid_message_is_dlqd_without_touching_the_sink() {
    let sink = Arc::new(pipeline_core::InMemorySink::new());
    let (worker, queue, audit) = worker_with(None, None, sink.clone());
    let msg = Message::new("", "Test payload");
    let id = msg.id;
    queue.enqueue(msg).await.unwrap();

    let outcome = worker.process_one().await;

    assert_eq!(outcome, ProcessOutcome::Failed);
    assert_eq!(queue.depth().await, 0);
    assert_eq!(queue.dlq_depth().await, 1);
    assert!(sink.get_all().await.unwrap().is_empty());
    let row = audit.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.status, AuditStatus::Failed);
    assert_eq!(row.error_message.as_deref(), Some("Validation failed"));
}
