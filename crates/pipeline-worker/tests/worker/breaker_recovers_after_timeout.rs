//! Scenario 6 (spec §8): after the breaker's timeout elapses, a probe call
//! through the worker succeeds and closes the breaker again.

use std::sync::Arc;
use std::time::Duration;

use pipeline_circuitbreaker::{CircuitBreaker, CircuitState};
use pipeline_core::{CoreError, Message, Queue};
use pipeline_worker::ProcessOutcome;

use crate::support::{worker_with, FlakySink};

#[tokio::test]
async fn breaker_recovers_to_closed_after_timeout_and_a_successful_probe() {
    let sink = Arc::new(FlakySink::new(0));
    let breaker = Arc::new(
        CircuitBreaker::builder()
            .failure_threshold(1)
            .timeout(Duration::from_millis(10))
            .build::<CoreError>()
            .unwrap(),
    );
    breaker
        .call::<(), CoreError>(|| Err(CoreError::Store("boom".into())))
        .ok();
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(20)).await;

    let (worker, queue, _audit) = worker_with(None, Some(Arc::clone(&breaker)), sink);
    queue.enqueue(Message::new("sys", "payload")).await.unwrap();

    let outcome = worker.process_one().await;

    assert_eq!(outcome, ProcessOutcome::Completed);
    assert_eq!(breaker.state(), CircuitState::Closed);
}
