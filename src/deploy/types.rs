use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an asynchronous vendor deployment
///
/// `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Submitted,
    InProgress,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Map a vendor status string, unknown values count as still running
    pub fn from_vendor(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "submitted" | "pending" | "queued" | "created" | "waiting" => Self::Submitted,
            "succeeded" | "success" | "successful" | "completed" | "complete" | "done"
            | "finished" | "deployed" => Self::Succeeded,
            "failed" | "failure" | "fail" | "error" | "aborted" | "cancelled" => Self::Failed,
            _ => Self::InProgress,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Submitted => write!(f, "SUBMITTED"),
            TaskStatus::InProgress => write!(f, "IN_PROGRESS"),
            TaskStatus::Succeeded => write!(f, "SUCCEEDED"),
            TaskStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Vendor-side asynchronous deployment, as last read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTask {
    pub id: String,
    pub status: TaskStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Vendor-provided detail, mostly useful on failure
    pub message: Option<String>,
}

impl DeploymentTask {
    /// Task in `status` with no timestamps
    pub fn new(id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            status,
            submitted_at: None,
            finished_at: None,
            message: None,
        }
    }

    /// Status after applying the finish-timestamp rule
    ///
    /// Some vendors never flip the status string and only stamp a finish
    /// time; a non-failed task with a finish time is treated as succeeded.
    pub fn effective_status(&self) -> TaskStatus {
        match (self.status, self.finished_at) {
            (TaskStatus::Failed, _) => TaskStatus::Failed,
            (_, Some(_)) => TaskStatus::Succeeded,
            (status, None) => status,
        }
    }
}
