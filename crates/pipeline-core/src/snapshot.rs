//! JSON-backed save/load of unprocessed messages for crash recovery (C10).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::message::{Message, MessageStatus};

/// On-disk shape for a snapshotted message, matching §6's field list
/// exactly (`Status` as its integer ordinal).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotMessage {
    #[serde(rename = "MessageId")]
    message_id: Uuid,
    #[serde(rename = "Timestamp")]
    timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "SourceSystem")]
    source_system: String,
    #[serde(rename = "Payload")]
    payload: String,
    #[serde(rename = "Status")]
    status: u8,
}

impl From<&Message> for SnapshotMessage {
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

impl TryFrom<SnapshotMessage> for Message {
    type Error = CoreError;

    fn try_from(snap: SnapshotMessage) -> Result<Self, CoreError> {
        Ok(Message {
            id: snap.message_id,
            timestamp: snap.timestamp,
            source: snap.source_system,
            payload: snap.payload,
            status: MessageStatus::from_ordinal(snap.status)
                .ok_or_else(|| CoreError::Store(format!("unknown status ordinal {}", snap.status)))?,
        })
    }
}

/// JSON-backed recovery store for messages not yet processed.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates the containing directory if absent.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    /// Serialises `messages` to the snapshot file, overwriting it.
    pub fn save(&self, messages: &[Message]) -> Result<(), CoreError> {
        let snaps: Vec<SnapshotMessage> = messages.iter().map(SnapshotMessage::from).collect();
        let json = serde_json::to_string_pretty(&snaps)
            .map_err(|e| CoreError::Store(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Returns the previously saved list, or an empty list if the file does
    /// not exist or contains invalid JSON.
    pub fn load(&self) -> Vec<Message> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        let Ok(snaps) = serde_json::from_str::<Vec<SnapshotMessage>>(&contents) else {
            return Vec::new();
        };
        snaps
            .into_iter()
            .filter_map(|s| Message::try_from(s).ok())
            .collect()
    }
}
