//! Task model and processing-lock metadata.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// The textual forms are the operator-facing strings persisted by every
/// backend; `FailedRetryCreated` renders as `"Failed Retry Created"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(rename = "Failed Retry Created")]
    FailedRetryCreated,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Processing => "Processing",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
            TaskStatus::FailedRetryCreated => "Failed Retry Created",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(TaskStatus::Pending),
            "Processing" => Ok(TaskStatus::Processing),
            "Completed" => Ok(TaskStatus::Completed),
            "Failed" => Ok(TaskStatus::Failed),
            "Failed Retry Created" => Ok(TaskStatus::FailedRetryCreated),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Error for unrecognized status strings coming out of a backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0:?}")]
pub struct UnknownStatus(pub String);

/// A persistent unit of work identified by its source URL.
///
/// `id` is opaque throughout the engine; only the persistence adapters know
/// whether it maps to a rowid, a UUID, or a page id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub url: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub error_message: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub processing_duration: Option<f64>,
    pub locked_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub retry_of_task_id: Option<String>,
    #[serde(default)]
    pub retry_reason: String,
    pub external_page_id: Option<String>,
}

/// Metadata describing the global processing lock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingLockInfo {
    pub worker_id: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
}

/// Per-status queue totals.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub failed_retry_created: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_round_trips() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::FailedRetryCreated,
        ] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
    }

    #[test]
    fn retry_status_keeps_spaced_form() {
        assert_eq!(TaskStatus::FailedRetryCreated.as_str(), "Failed Retry Created");
        let json = serde_json::to_string(&TaskStatus::FailedRetryCreated).unwrap();
        assert_eq!(json, "\"Failed Retry Created\"");
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("Archived".parse::<TaskStatus>().is_err());
    }
}
