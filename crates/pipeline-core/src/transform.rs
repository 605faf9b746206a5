//! Pure mapping from an inbound [`Message`] to a [`ProcessedRecord`] (C4).

use chrono::Utc;

use crate::message::{Message, MessageStatus, ProcessedRecord};

const PROCESSED_PREFIX: &str = "PROCESSED_";

/// Produces a [`ProcessedRecord`] from `msg`: `payload` is prefixed,
/// `status` is set to `Processing`, `processed_at` is the current instant,
/// and every other field is copied verbatim. Deterministic given a fixed
/// clock; has no other side effects.
pub fn transform(msg: &Message) -> ProcessedRecord {
    ProcessedRecord {
        id: msg.id,
        timestamp: msg.timestamp,
        source: msg.source.clone(),
        payload: format!("{PROCESSED_PREFIX}{}", msg.payload),
        status: MessageStatus::Processing,
        processed_at: Utc::now(),
    }
}
