//! Scenario 3 (spec §8): the sink fails a few times, then succeeds, within
//! the retry budget.

use std::sync::Arc;

use pipeline_core::{Message, Queue, Sink};
use pipeline_retry::RetryPolicy;
use pipeline_worker::ProcessOutcome;

use crate::support::{worker_with, FlakySink};

#[tokio::test]
async fn transient_failures_within_the_retry_budget_eventually_commit() {
    let sink = Arc::new(FlakySink::new(3));
    let retry = RetryPolicy::builder().max_retries(3).build().unwrap();
    let (worker, queue, _audit) = worker_with(Some(retry), None, sink.clone());
    let msg = Message::new("sys", "payload");
    let id = msg.id;
    queue.enqueue(msg).await.unwrap();

    let outcome = worker.process_one().await;

    assert_eq!(outcome, ProcessOutcome::Completed);
    assert_eq!(sink.call_count(), 4);
    assert!(sink.get_by_id(id).await.unwrap().is_some());
    assert_eq!(queue.dlq_depth().await, 0);
}
