use thiserror::Error;

/// Errors raised while standing up a [`crate::RabbitMqQueue`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to RabbitMQ: {0}")]
    ConnectionFailed(String),

    #[error("failed to open channel: {0}")]
    ChannelFailed(String),

    #[error("failed to declare queue {queue}: {source}")]
    QueueDeclarationFailed { queue: String, source: String },
}
