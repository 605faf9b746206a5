//! Scenario 4 (spec §8): the sink always fails; retries exhaust and the
//! message moves to the DLQ.

use std::sync::Arc;

use pipeline_core::{Message, Queue};
use pipeline_retry::RetryPolicy;
use pipeline_worker::ProcessOutcome;

use crate::support::{worker_with, FlakySink};

#[tokio::test]
async fn retry_exhaustion_moves_the_message_to_the_dlq() {
    let sink = Arc::new(FlakySink::new(10));
    let retry = RetryPolicy::builder().max_retries(3).build().unwrap();
    let (worker, queue, _audit) = worker_with(Some(retry), None, sink.clone());
    queue.enqueue(Message::new("sys", "payload")).await.unwrap();

    let outcome = worker.process_one().await;

    assert_eq!(outcome, ProcessOutcome::Failed);
    assert_eq!(sink.call_count(), 4);
    assert_eq!(queue.dlq_depth().await, 1);
}
