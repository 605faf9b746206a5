//! Queue abstraction and its local, in-process implementation (C2).
//!
//! The worker programs against [`Queue`]; the local FIFO and the RabbitMQ
//! broker adapter (`pipeline-transport-rabbitmq`) are interchangeable behind
//! it. Dedup belongs only to the local implementation — a broker adapter
//! delegates deduplication to its upstream publishers.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashSet;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::CoreError;
use crate::message::Message;

/// Capability set shared by every transport.
///
/// All operations are safe under contending producers and consumers.
/// `dequeue` removes the id from the dedup set (if the implementation keeps
/// one) so a message may be re-published if it is later re-submitted from an
/// upstream source — prune-on-dequeue, per the pipeline's recovery model.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueues `msg` on the main queue. Fails with
    /// [`CoreError::DuplicateMessage`] when `msg.id` is already resident;
    /// the queue is left unchanged in that case.
    async fn enqueue(&self, msg: Message) -> Result<(), CoreError>;

    /// Dequeues the oldest message on the main queue, if any.
    async fn dequeue(&self) -> Option<Message>;

    /// Number of messages currently on the main queue.
    async fn depth(&self) -> usize;

    /// Enqueues `msg` on the dead-letter queue. Never rejects for
    /// duplication.
    async fn enqueue_dlq(&self, msg: Message);

    /// Dequeues the oldest message on the dead-letter queue, if any.
    async fn dequeue_dlq(&self) -> Option<Message>;

    /// Number of messages currently on the dead-letter queue.
    async fn dlq_depth(&self) -> usize;
}

/// Process-local, unbounded FIFO with a concurrent per-id dedup set on the
/// main queue.
#[derive(Default)]
pub struct LocalQueue {
    main: Mutex<VecDeque<Message>>,
    dlq: Mutex<VecDeque<Message>>,
    resident: DashSet<Uuid>,
}

impl LocalQueue {
    pub fn new() -> Self {
        Self {
            main: Mutex::new(VecDeque::new()),
            dlq: Mutex::new(VecDeque::new()),
            resident: DashSet::new(),
        }
    }
}

#[async_trait]
impl Queue for LocalQueue {
    async fn enqueue(&self, msg: Message) -> Result<(), CoreError> {
        if !self.resident.insert(msg.id) {
            return Err(CoreError::DuplicateMessage(msg.id));
        }
        self.main.lock().push_back(msg);
        Ok(())
    }

    async fn dequeue(&self) -> Option<Message> {
        let msg = self.main.lock().pop_front();
        if let Some(msg) = &msg {
            self.resident.remove(&msg.id);
        }
        msg
    }

    async fn depth(&self) -> usize {
        self.main.lock().len()
    }

    async fn enqueue_dlq(&self, msg: Message) {
        self.dlq.lock().push_back(msg);
    }

    async fn dequeue_dlq(&self) -> Option<Message> {
        self.dlq.lock().pop_front()
    }

    async fn dlq_depth(&self) -> usize {
        self.dlq.lock().len()
    }
}
