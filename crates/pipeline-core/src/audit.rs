//! Start/end timestamps, duration, and outcome per message attempt (C8).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::CoreError;

/// Outcome recorded on an [`AuditRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Processing,
    Completed,
    Failed,
}

impl AuditStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "Processing" => Ok(Self::Processing),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            other => Err(CoreError::Store(format!("unknown audit status {other}"))),
        }
    }
}

/// One row of the audit trail. `end_time` is present iff `status` is not
/// `Processing`; `duration_ms` is set whenever `end_time` is.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRow {
    pub id: i64,
    pub message_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<f64>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
}

/// Aggregate statistics over rows with a non-null duration.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditStatistics {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub success_rate: f64,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Inserts a row with `status = Processing` and no end time. Fails with
    /// [`CoreError::AuditRowExists`] if `id` already has a row.
    async fn log_start(&self, id: Uuid) -> Result<(), CoreError>;

    /// Closes out the row for `id`. Silently returns if no row exists for
    /// `id` — `LogEnd` without a prior `LogStart` is a no-op, not an error.
    async fn log_end(
        &self,
        id: Uuid,
        success: bool,
        error_message: Option<String>,
    ) -> Result<(), CoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<AuditRow>, CoreError>;

    /// Newest first by start time.
    async fn get_all(&self) -> Result<Vec<AuditRow>, CoreError>;

    async fn statistics(&self) -> Result<AuditStatistics, CoreError>;
}

fn compute_statistics(rows: &[AuditRow]) -> AuditStatistics {
    let durations: Vec<f64> = rows.iter().filter_map(|r| r.duration_ms).collect();
    let total = durations.len() as u64;
    let success = rows
        .iter()
        .filter(|r| r.duration_ms.is_some() && r.status == AuditStatus::Completed)
        .count() as u64;
    let failure = rows
        .iter()
        .filter(|r| r.duration_ms.is_some() && r.status == AuditStatus::Failed)
        .count() as u64;

    if total == 0 {
        return AuditStatistics {
            total: 0,
            success: 0,
            failure: 0,
            avg_duration_ms: 0.0,
            min_duration_ms: 0.0,
            max_duration_ms: 0.0,
            success_rate: 0.0,
        };
    }

    let sum: f64 = durations.iter().sum();
    AuditStatistics {
        total,
        success,
        failure,
        avg_duration_ms: sum / total as f64,
        min_duration_ms: durations.iter().cloned().fold(f64::INFINITY, f64::min),
        max_duration_ms: durations.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        success_rate: 100.0 * success as f64 / total as f64,
    }
}

/// SQLite-backed audit store matching the `AuditLogs` table named in the
/// pipeline's external interface contract.
pub struct SqliteAuditStore {
    pool: SqlitePool,
}

impl SqliteAuditStore {
    pub async fn connect(path: &str) -> Result<Self, CoreError> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

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
            CREATE TABLE IF NOT EXISTS AuditLogs (
                Id INTEGER PRIMARY KEY AUTOINCREMENT,
                MessageId TEXT UNIQUE NOT NULL,
                StartTime TEXT NOT NULL,
                EndTime TEXT NULL,
                DurationMs REAL NULL,
                Status TEXT NOT NULL,
                ErrorMessage TEXT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| CoreError::Store(e.to_string()))?;

        Ok(Self { pool })
    }
}

fn row_to_audit_row(row: sqlx::sqlite::SqliteRow) -> Result<AuditRow, CoreError> {
    let id: i64 = row.try_get("Id").map_err(store_err)?;
    let message_id: String = row.try_get("MessageId").map_err(store_err)?;
    let start_time: String = row.try_get("StartTime").map_err(store_err)?;
    let end_time: Option<String> = row.try_get("EndTime").map_err(store_err)?;
    let duration_ms: Option<f64> = row.try_get("DurationMs").map_err(store_err)?;
    let status: String = row.try_get("Status").map_err(store_err)?;
    let error_message: Option<String> = row.try_get("ErrorMessage").map_err(store_err)?;

    Ok(AuditRow {
        id,
        message_id: Uuid::parse_str(&message_id).map_err(|e| CoreError::Store(e.to_string()))?,
        start_time: parse_rfc3339(&start_time)?,
        end_time: end_time.as_deref().map(parse_rfc3339).transpose()?,
        duration_ms,
        status: AuditStatus::parse(&status)?,
        error_message,
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

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn log_start(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO AuditLogs (MessageId, StartTime, Status)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(id.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(AuditStatus::Processing.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(CoreError::AuditRowExists(id))
            }
            Err(e) => Err(CoreError::Store(e.to_string())),
        }
    }

    async fn log_end(
        &self,
        id: Uuid,
        success: bool,
        error_message: Option<String>,
    ) -> Result<(), CoreError> {
        let row = sqlx::query(r#"SELECT StartTime FROM AuditLogs WHERE MessageId = ?1"#)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::Store(e.to_string()))?;

        let Some(row) = row else {
            return Ok(());
        };
        let start_time: String = row.try_get("StartTime").map_err(store_err)?;
        let start_time = parse_rfc3339(&start_time)?;
        let end_time = Utc::now();
        let duration_ms = (end_time - start_time).num_milliseconds() as f64;
        let status = if success {
            AuditStatus::Completed
        } else {
            AuditStatus::Failed
        };

        sqlx::query(
            r#"
            UPDATE AuditLogs
            SET EndTime = ?1, DurationMs = ?2, Status = ?3, ErrorMessage = ?4
            WHERE MessageId = ?5
            "#,
        )
        .bind(end_time.to_rfc3339())
        .bind(duration_ms)
        .bind(status.as_str())
        .bind(error_message)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::Store(e.to_string()))?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<AuditRow>, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT Id, MessageId, StartTime, EndTime, DurationMs, Status, ErrorMessage
            FROM AuditLogs WHERE MessageId = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::Store(e.to_string()))?;

        row.map(row_to_audit_row).transpose()
    }

    async fn get_all(&self) -> Result<Vec<AuditRow>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT Id, MessageId, StartTime, EndTime, DurationMs, Status, ErrorMessage
            FROM AuditLogs ORDER BY StartTime DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::Store(e.to_string()))?;

        rows.into_iter().map(row_to_audit_row).collect()
    }

    async fn statistics(&self) -> Result<AuditStatistics, CoreError> {
        let rows = self.get_all().await?;
        Ok(compute_statistics(&rows))
    }
}

/// In-memory audit store used by tests and by callers that don't need
/// SQLite persistence.
#[derive(Default)]
pub struct InMemoryAuditStore {
    rows: parking_lot::Mutex<Vec<AuditRow>>,
    next_id: std::sync::atomic::AtomicI64,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn log_start(&self, id: Uuid) -> Result<(), CoreError> {
        let mut rows = self.rows.lock();
        if rows.iter().any(|r| r.message_id == id) {
            return Err(CoreError::AuditRowExists(id));
        }
        let row_id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        rows.push(AuditRow {
            id: row_id,
            message_id: id,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
            status: AuditStatus::Processing,
            error_message: None,
        });
        Ok(())
    }

    async fn log_end(
        &self,
        id: Uuid,
        success: bool,
        error_message: Option<String>,
    ) -> Result<(), CoreError> {
        let mut rows = self.rows.lock();
        let Some(row) = rows.iter_mut().find(|r| r.message_id == id) else {
            return Ok(());
        };
        let end_time = Utc::now();
        row.duration_ms = Some((end_time - row.start_time).num_milliseconds() as f64);
        row.end_time = Some(end_time);
        row.status = if success {
            AuditStatus::Completed
        } else {
            AuditStatus::Failed
        };
        row.error_message = error_message;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<AuditRow>, CoreError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|r| r.message_id == id)
            .cloned())
    }

    async fn get_all(&self) -> Result<Vec<AuditRow>, CoreError> {
        let mut rows = self.rows.lock().clone();
        rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(rows)
    }

    async fn statistics(&self) -> Result<AuditStatistics, CoreError> {
        Ok(compute_statistics(&self.rows.lock()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_start_then_log_end_completed_updates_status_and_duration() {
        let store = InMemoryAuditStore::new();
        let id = Uuid::new_v4();
        store.log_start(id).await.unwrap();
        let row = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.status, AuditStatus::Processing);
        assert!(row.end_time.is_none());

        store.log_end(id, true, None).await.unwrap();
        let row = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.status, AuditStatus::Completed);
        assert!(row.end_time.is_some());
        assert!(row.duration_ms.unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn log_end_without_log_start_is_a_silent_no_op() {
        let store = InMemoryAuditStore::new();
        store.log_end(Uuid::new_v4(), false, None).await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn log_start_twice_for_the_same_id_is_a_store_error() {
        let store = InMemoryAuditStore::new();
        let id = Uuid::new_v4();
        store.log_start(id).await.unwrap();
        let err = store.log_start(id).await.unwrap_err();
        assert!(matches!(err, CoreError::AuditRowExists(got) if got == id));
    }

    #[tokio::test]
    async fn statistics_only_considers_rows_with_a_duration() {
        let store = InMemoryAuditStore::new();
        let still_processing = Uuid::new_v4();
        store.log_start(still_processing).await.unwrap();

        let completed = Uuid::new_v4();
        store.log_start(completed).await.unwrap();
        store.log_end(completed, true, None).await.unwrap();

        let failed = Uuid::new_v4();
        store.log_start(failed).await.unwrap();
        store
            .log_end(failed, false, Some("boom".to_string()))
            .await
            .unwrap();

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.failure, 1);
        assert_eq!(stats.success_rate, 50.0);
    }

    #[tokio::test]
    async fn sqlite_audit_store_bootstraps_schema_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        let store = SqliteAuditStore::connect(path.to_str().unwrap())
            .await
            .unwrap();
        let id = Uuid::new_v4();
        store.log_start(id).await.unwrap();
        store.log_end(id, true, None).await.unwrap();
        let row = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.status, AuditStatus::Completed);
    }
}
