//! [`pipeline_core::Queue`] over RabbitMQ, via `lapin`.
//!
//! Declares the main queue and a sibling `<queue>-dlq`, both durable.
//! Dedup is not attempted here — per the queue contract, that is the local
//! implementation's job; a broker adapter trusts its upstream publishers.
//! Each message crosses the wire as a UTF-8 JSON body with the same field
//! schema as the snapshot file (§6); the broker's message-id and timestamp
//! properties mirror the message's own fields.

mod error;

pub use error::TransportError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lapin::options::{
    BasicAckOptions, BasicGetOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pipeline_core::{CoreError, Message, MessageStatus, Queue};

const DLQ_SUFFIX: &str = "-dlq";

/// Wire shape for a message crossing the broker; field names match the
/// snapshot file's exactly (`Status` as its integer ordinal).
#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    #[serde(rename = "MessageId")]
    message_id: Uuid,
    #[serde(rename = "Timestamp")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "SourceSystem")]
    source_system: String,
    #[serde(rename = "Payload")]
    payload: String,
    #[serde(rename = "Status")]
    status: u8,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self {
            message_id: msg.id,
            timestamp: msg.timestamp,
            source_system: msg.source.clone(),
            payload: msg.payload.clone(),
            status: msg.status.ordinal(),
        }
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = CoreError;

    fn try_from(wire: WireMessage) -> Result<Self, CoreError> {
        Ok(Message {
            id: wire.message_id,
            timestamp: wire.timestamp,
            source: wire.source_system,
            payload: wire.payload,
            status: MessageStatus::from_ordinal(wire.status)
                .ok_or_else(|| CoreError::Store(format!("unknown status ordinal {}", wire.status)))?,
        })
    }
}

/// A [`pipeline_core::Queue`] backed by a RabbitMQ main queue and its
/// `<queue>-dlq` sibling. `dequeue`/`dequeue_dlq` pull one message at a
/// time via `basic_get` and ack immediately — the worker owns the message
/// for the rest of its lifetime once dequeued, per the pipeline's recovery
/// model.
pub struct RabbitMqQueue {
    _connection: Connection,
    channel: Channel,
    queue_name: String,
    dlq_name: String,
}

impl RabbitMqQueue {
    /// Connects to `amqp_url` and declares both the main queue and its DLQ,
    /// both durable.
    pub async fn connect(amqp_url: &str, queue_name: &str) -> Result<Self, TransportError> {
        let connection = Connection::connect(amqp_url, ConnectionProperties::default())
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| TransportError::ChannelFailed(e.to_string()))?;

        let dlq_name = format!("{queue_name}{DLQ_SUFFIX}");

        for name in [queue_name, dlq_name.as_str()] {
            channel
                .queue_declare(
                    name,
                    QueueDeclareOptions {
                        durable: true,
                        exclusive: false,
                        auto_delete: false,
                        nowait: false,
                        passive: false,
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| TransportError::QueueDeclarationFailed {
                    queue: name.to_string(),
                    source: e.to_string(),
                })?;
        }

        Ok(Self {
            _connection: connection,
            channel,
            queue_name: queue_name.to_string(),
            dlq_name,
        })
    }

    async fn publish_to(&self, queue: &str, msg: &Message) -> Result<(), CoreError> {
        let wire = WireMessage::from(msg);
        let body = serde_json::to_vec(&wire).map_err(|e| CoreError::Store(e.to_string()))?;
        let properties = BasicProperties::default()
            .with_message_id(msg.id.to_string().into())
            .with_timestamp(msg.timestamp.timestamp() as u64)
            .with_content_type("application/json".into());

        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(|e| CoreError::Store(e.to_string()))?
            .await
            .map_err(|e| CoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn pop_from(&self, queue: &str) -> Option<Message> {
        let delivery = match self
            .channel
            .basic_get(queue, BasicGetOptions::default())
            .await
        {
            Ok(Some(delivery)) => delivery,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(queue, error = %e, "basic_get failed");
                return None;
            }
        };

        let wire: WireMessage = match serde_json::from_slice(&delivery.data) {
            Ok(wire) => wire,
            Err(e) => {
                tracing::warn!(queue, error = %e, "malformed message body");
                return None;
            }
        };

        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            tracing::warn!(queue, error = %e, "failed to ack delivery");
        }

        Message::try_from(wire).ok()
    }

    async fn depth_of(&self, queue: &str) -> usize {
        match self
            .channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    nowait: false,
                    passive: true,
                },
                FieldTable::default(),
            )
            .await
        {
            Ok(declared) => declared.message_count() as usize,
            Err(e) => {
                tracing::warn!(queue, error = %e, "passive queue_declare failed");
                0
            }
        }
    }
}

#[async_trait]
impl Queue for RabbitMqQueue {
    async fn enqueue(&self, msg: Message) -> Result<(), CoreError> {
        self.publish_to(&self.queue_name, &msg).await
    }

    async fn dequeue(&self) -> Option<Message> {
        self.pop_from(&self.queue_name).await
    }

    async fn depth(&self) -> usize {
        self.depth_of(&self.queue_name).await
    }

    async fn enqueue_dlq(&self, msg: Message) {
        if let Err(e) = self.publish_to(&self.dlq_name, &msg).await {
            tracing::error!(message_id = %msg.id, error = %e, "failed to publish to DLQ");
        }
    }

    async fn dequeue_dlq(&self) -> Option<Message> {
        self.pop_from(&self.dlq_name).await
    }

    async fn dlq_depth(&self) -> usize {
        self.depth_of(&self.dlq_name).await
    }
}
