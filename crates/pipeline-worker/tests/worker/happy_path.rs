//! Scenario 1 (spec §8): enqueue a valid message, `process_one` commits it.

use std::sync::Arc;

use pipeline_core::{AuditStatus, Message, MessageStatus, Queue, Sink};
use pipeline_worker::ProcessOutcome;

use crate::support::worker_with;

#[tokio::test]
async fn happy_path_commits_the_transformed_payload_and_completes_the_audit_row() {
    let sink = Arc::new(pipeline_core::InMemorySink::new());
    let (worker, queue, audit) = worker_with(None, None, sink.clone());
    let msg = Message::new("TestSystem", "Test payload");
    let id = msg.id;
    queue.enqueue(msg).await.unwrap();

    let outcome = worker.process_one().await;

    assert_eq!(outcome, ProcessOutcome::Completed);
    let record = sink.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(record.payload, "PROCESSED_Test payload");
    assert_eq!(record.status, MessageStatus::Completed);
    assert_eq!(queue.depth().await, 0);
    assert_eq!(queue.dlq_depth().await, 0);
    let row = audit.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.status, AuditStatus::Completed);
    assert!(row.duration_ms.unwrap() >= 0.0);
}
