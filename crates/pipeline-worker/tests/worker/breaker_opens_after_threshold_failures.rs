//! Scenario 5 (spec §8): once the breaker is open, a message goes straight
//! to the DLQ without the sink — or a retry — being invoked.

use std::sync::Arc;
use std::time::Duration;

use pipeline_circuitbreaker::CircuitBreaker;
use pipeline_core::{CoreError, Message, Queue};
use pipeline_retry::RetryPolicy;
use pipeline_worker::ProcessOutcome;

use crate::support::{worker_with, FlakySink};

#[tokio::test]
async fn an_open_circuit_sends_the_message_straight_to_the_dlq_without_retrying() {
    let sink = Arc::new(FlakySink::new(100));
    let retry = RetryPolicy::builder().max_retries(5).build().unwrap();
    let breaker = Arc::new(
        CircuitBreaker::builder()
            .failure_threshold(1)
            .timeout(Duration::from_secs(30))
            .build::<CoreError>()
            .unwrap(),
    );
    let (worker, queue, _audit) =
        worker_with(Some(retry), Some(Arc::clone(&breaker)), sink.clone());
    // Trip the breaker directly so the next process_one sees it open.
    breaker
        .call::<(), CoreError>(|| Err(CoreError::Store("boom".into())))
        .ok();

    queue.enqueue(Message::new("sys", "payload")).await.unwrap();
    let before_calls = sink.call_count();

    let outcome = worker.process_one().await;

    assert_eq!(outcome, ProcessOutcome::Failed);
    assert_eq!(sink.call_count(), before_calls);
    assert_eq!(queue.dlq_depth().await, 1);
}
