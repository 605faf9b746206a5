//! `process_up_to`/`process_all` driver contracts (spec §4.9): the former
//! stops early once the queue drains, the latter samples depth once and
//! ignores messages enqueued mid-loop.

use std::sync::Arc;

use pipeline_core::{Message, Queue};
use pipeline_worker::ProcessOutcome;

use crate::support::worker_with;

#[tokio::test]
async fn process_up_to_stops_early_once_the_queue_is_empty() {
    let sink = Arc::new(pipeline_core::InMemorySink::new());
    let (worker, queue, _audit) = worker_with(None, None, sink);
    queue.enqueue(Message::new("sys", "one")).await.unwrap();
    queue.enqueue(Message::new("sys", "two")).await.unwrap();

    let outcomes = worker.process_up_to(10).await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| *o == ProcessOutcome::Completed));
}

#[tokio::test]
async fn process_all_samples_depth_once_and_ignores_messages_enqueued_mid_loop() {
    let sink = Arc::new(pipeline_core::InMemorySink::new());
    let (worker, queue, _audit) = worker_with(None, None, sink);
    queue.enqueue(Message::new("sys", "one")).await.unwrap();

    let outcomes = worker.process_all().await;
    // process_all read depth=1 before this extra enqueue could be observed.
    queue.enqueue(Message::new("sys", "two")).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(queue.depth().await, 1);
}
