//! Durable store of processed records, keyed by message id (C3).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::CoreError;
use crate::message::{Message, MessageStatus, ProcessedRecord};

/// The sink is a black box from the worker's perspective: any failure,
/// transient or permanent, is surfaced as a [`CoreError`] to be classified
/// by the outer layers (retry policy, circuit breaker).
#[async_trait]
pub trait Sink: Send + Sync {
    /// Persists `record`. Fails with [`CoreError::DuplicateKey`] if a record
    /// with the same id already exists.
    async fn save(&self, record: ProcessedRecord) -> Result<(), CoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<ProcessedRecord>, CoreError>;

    async fn get_all(&self) -> Result<Vec<ProcessedRecord>, CoreError>;
}

/// SQLite-backed sink matching the `ProcessedMessages` table named in the
/// pipeline's external interface contract.
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    /// Opens (creating if absent) the SQLite database at `path` and runs the
    /// idempotent schema bootstrap.
    pub async fn connect(path: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| CoreError::Store(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ProcessedMessages (
                MessageId   TEXT PRIMARY KEY,
                Timestamp   TEXT NOT NULL,
                SourceSystem TEXT NOT NULL,
                Payload     TEXT NOT NULL,
                Status      INTEGER NOT NULL,
                ProcessedAt TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| CoreError::Store(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Sink for SqliteSink {
    async fn save(&self, record: ProcessedRecord) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO ProcessedMessages
                (MessageId, Timestamp, SourceSystem, Payload, Status, ProcessedAt)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.timestamp.to_rfc3339())
        .bind(&record.source)
        .bind(&record.payload)
        .bind(record.status.ordinal() as i64)
        .bind(record.processed_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(CoreError::DuplicateKey(record.id))
            }
            Err(e) => Err(CoreError::Store(e.to_string())),
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<ProcessedRecord>, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT MessageId, Timestamp, SourceSystem, Payload, Status, ProcessedAt
            FROM ProcessedMessages WHERE MessageId = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::Store(e.to_string()))?;

        row.map(row_to_record).transpose()
    }

    async fn get_all(&self) -> Result<Vec<ProcessedRecord>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT MessageId, Timestamp, SourceSystem, Payload, Status, ProcessedAt
            FROM ProcessedMessages
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::Store(e.to_string()))?;

        rows.into_iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<ProcessedRecord, CoreError> {
    let id: String = row.try_get("MessageId").map_err(store_err)?;
    let timestamp: String = row.try_get("Timestamp").map_err(store_err)?;
    let source: String = row.try_get("SourceSystem").map_err(store_err)?;
    let payload: String = row.try_get("Payload").map_err(store_err)?;
    let status: i64 = row.try_get("Status").map_err(store_err)?;
    let processed_at: String = row.try_get("ProcessedAt").map_err(store_err)?;

    Ok(ProcessedRecord {
        id: Uuid::parse_str(&id).map_err(|e| CoreError::Store(e.to_string()))?,
        timestamp: parse_rfc3339(&timestamp)?,
        source,
        payload,
        status: MessageStatus::from_ordinal(status as u8)
            .ok_or_else(|| CoreError::Store(format!("unknown status ordinal {status}")))?,
        processed_at: parse_rfc3339(&processed_at)?,
    })
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::Store(e.to_string()))
}

fn store_err(e: sqlx::Error) -> CoreError {
    CoreError::Store(e.to_string())
}

/// Pure in-memory sink used by unit/integration tests that don't need a
/// filesystem-backed database.
#[derive(Default)]
pub struct InMemorySink {
    records: parking_lot::Mutex<std::collections::HashMap<Uuid, ProcessedRecord>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn save(&self, record: ProcessedRecord) -> Result<(), CoreError> {
        let mut records = self.records.lock();
        if records.contains_key(&record.id) {
            return Err(CoreError::DuplicateKey(record.id));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<ProcessedRecord>, CoreError> {
        Ok(self.records.lock().get(&id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<ProcessedRecord>, CoreError> {
        Ok(self.records.lock().values().cloned().collect())
    }
}

/// Convenience to build a [`ProcessedRecord`] manually in tests; the real
/// construction path is `pipeline_core::transform::transform`.
#[cfg(test)]
pub(crate) fn record_for(msg: &Message, payload: impl Into<String>) -> ProcessedRecord {
    ProcessedRecord {
        id: msg.id,
        timestamp: msg.timestamp,
        source: msg.source.clone(),
        payload: payload.into(),
        status: MessageStatus::Completed,
        processed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_get_by_id_round_trips_every_field() {
        let sink = InMemorySink::new();
        let msg = Message::new("sys", "payload");
        let record = record_for(&msg, "PROCESSED_payload");
        sink.save(record.clone()).await.unwrap();
        let fetched = sink.get_by_id(msg.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn saving_same_id_twice_fails_with_duplicate_key() {
        let sink = InMemorySink::new();
        let msg = Message::new("sys", "payload");
        sink.save(record_for(&msg, "a")).await.unwrap();
        let err = sink.save(record_for(&msg, "b")).await.unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey(id) if id == msg.id));
    }

    #[tokio::test]
    async fn unknown_id_returns_none_not_an_error() {
        let sink = InMemorySink::new();
        assert!(sink.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_sink_bootstraps_schema_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sink.db");
        let sink = SqliteSink::connect(path.to_str().unwrap()).await.unwrap();
        let msg = Message::new("sys", "payload");
        let record = record_for(&msg, "PROCESSED_payload");
        sink.save(record.clone()).await.unwrap();
        let fetched = sink.get_by_id(msg.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);

        let err = sink.save(record).await.unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey(_)));
    }
}
