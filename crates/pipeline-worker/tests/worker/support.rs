//! Shared fixtures for the worker's cross-component integration scenarios.
//!
//! Not every scenario file uses every fixture here.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use pipeline_circuitbreaker::CircuitBreaker;
use pipeline_core::{
    CoreError, InMemoryAuditStore, InMemorySink, LocalQueue, ProcessedRecord, Sink,
};
use pipeline_retry::RetryPolicy;
use pipeline_worker::Worker;

pub fn worker_with(
    retry: Option<RetryPolicy>,
    breaker: Option<Arc<CircuitBreaker>>,
    sink: Arc<dyn Sink>,
) -> (Worker, Arc<LocalQueue>, Arc<InMemoryAuditStore>) {
    let queue = Arc::new(LocalQueue::default());
    let audit = Arc::new(InMemoryAuditStore::new());
    let mut builder = Worker::builder()
        .queue(queue.clone())
        .sink(sink)
        .audit(audit.clone());
    if let Some(r) = retry {
        builder = builder.retry(r);
    }
    if let Some(b) = breaker {
        builder = builder.breaker(b);
    }
    (builder.build().unwrap(), queue, audit)
}

/// A sink that fails its first `n` calls, then always succeeds.
pub struct FlakySink {
    remaining_failures: AtomicU32,
    inner: InMemorySink,
    calls: AtomicU32,
}

impl FlakySink {
    pub fn new(failures: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
            inner: InMemorySink::new(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for FlakySink {
    async fn save(&self, record: ProcessedRecord) -> Result<(), CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(CoreError::Store("transient failure".to_string()));
        }
        self.inner.save(record).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<ProcessedRecord>, CoreError> {
        self.inner.get_by_id(id).await
    }

    async fn get_all(&self) -> Result<Vec<ProcessedRecord>, CoreError> {
        self.inner.get_all().await
    }
}
