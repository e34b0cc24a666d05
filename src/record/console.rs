//! Log line records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

/// Exception attached to a log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetail {
    pub type_name: String,
    pub message: String,
    pub stack_trace: Option<String>,
}

/// One captured log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub category: String,
    pub exception: Option<ExceptionDetail>,
    pub event_id: Option<i64>,
}

impl ConsoleEntry {
    /// Create a log entry stamped with the current time
    pub fn new(level: LogLevel, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
            category: category.into(),
            exception: None,
            event_id: None,
        }
    }

    pub fn with_exception(mut self, exception: ExceptionDetail) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_event_id(mut self, event_id: i64) -> Self {
        self.event_id = Some(event_id);
        self
    }
}
