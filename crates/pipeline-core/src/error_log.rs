//! Append-only, thread-safe error log (C7).
//!
//! Each record is `[timestamp]`, message id, attempt number, exception type,
//! message, stack trace, followed by a separator line of 80 `-`. A missing
//! exception writes placeholders rather than failing.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::CoreError;

const SEPARATOR: &str = "--------------------------------------------------------------------------------";

/// Details of a single failed attempt, as reported to the error log.
#[derive(Debug, Clone, Default)]
pub struct ExceptionDetails {
    pub exception_type: Option<String>,
    pub message: Option<String>,
    pub stack_trace: Option<String>,
}

impl ExceptionDetails {
    pub fn new(exception_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exception_type: Some(exception_type.into()),
            message: Some(message.into()),
            stack_trace: None,
        }
    }
}

/// Append-only text sink. Writers serialise under one mutex so no two
/// records interleave.
pub struct ErrorLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ErrorLog {
    /// Creates the containing directory if absent and opens (without
    /// truncating) the log file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Appends one record for `message_id`'s `attempt`-th attempt.
    pub fn record(
        &self,
        message_id: Uuid,
        attempt: u32,
        details: &ExceptionDetails,
    ) -> Result<(), CoreError> {
        let entry = format!(
            "[{}]\nMessage ID: {}\nAttempt: {}\nException Type: {}\nError Message: {}\nStack Trace: {}\n{}\n",
            Utc::now().to_rfc3339(),
            message_id,
            attempt,
            details.exception_type.as_deref().unwrap_or("Unknown"),
            details.message.as_deref().unwrap_or("No exception details"),
            details.stack_trace.as_deref().unwrap_or("No stack trace available"),
            SEPARATOR,
        );

        let _guard = self.lock.lock();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.as_bytes())?;
        Ok(())
    }
}
