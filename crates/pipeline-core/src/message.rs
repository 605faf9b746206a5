//! Message model and validation (C1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageStatus {
    Created = 0,
    Sent = 1,
    Received = 2,
    Processing = 3,
    Completed = 4,
    Failed = 5,
}

impl MessageStatus {
    /// Round-trips through the integer ordinal used by the snapshot file and
    /// the `ProcessedMessages.Status` column.
    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Created),
            1 => Some(Self::Sent),
            2 => Some(Self::Received),
            3 => Some(Self::Processing),
            4 => Some(Self::Completed),
            5 => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

/// A business message flowing through the pipeline.
///
/// `id` is a fresh v4 UUID assigned at construction; `timestamp` is the
/// UTC instant of creation. Re-serialising a `Message` round-trips every
/// field exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub payload: String,
    pub status: MessageStatus,
}

impl Message {
    /// Creates a new message with a fresh id and the current UTC timestamp.
    pub fn new(source: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload: payload.into(),
            status: MessageStatus::Created,
        }
    }

    /// `IsValid ⇔ source and payload are both non-empty and non-whitespace`.
    pub fn is_valid(&self) -> bool {
        !self.source.trim().is_empty() && !self.payload.trim().is_empty()
    }
}

/// A processed message, keyed by `id`, as persisted by the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    /// Transformed payload (see `pipeline_core::transform`).
    pub payload: String,
    pub status: MessageStatus,
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_message_requires_non_blank_source_and_payload() {
        assert!(Message::new("sys", "payload").is_valid());
        assert!(!Message::new("", "payload").is_valid());
        assert!(!Message::new("sys", "").is_valid());
        assert!(!Message::new("   ", "payload").is_valid());
        assert!(!Message::new("sys", "\t\n").is_valid());
    }

    #[test]
    fn new_message_gets_a_fresh_id_each_time() {
        let a = Message::new("sys", "payload");
        let b = Message::new("sys", "payload");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn json_round_trip_preserves_every_field() {
        let msg = Message::new("sys", "payload");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn status_ordinal_round_trips() {
        for status in [
            MessageStatus::Created,
            MessageStatus::Sent,
            MessageStatus::Received,
            MessageStatus::Processing,
            MessageStatus::Completed,
            MessageStatus::Failed,
        ] {
            assert_eq!(MessageStatus::from_ordinal(status.ordinal()), Some(status));
        }
        assert_eq!(MessageStatus::from_ordinal(255), None);
    }
}
