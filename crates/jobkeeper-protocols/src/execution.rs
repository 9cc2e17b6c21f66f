//! Execution records and status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution status.
///
/// Transitions are monotonic: PENDING -> RUNNING -> {SUCCESS | FAILED}.
/// A terminal record is never rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Record created, body not yet started (manual trigger path).
    Pending,
    /// Body is executing.
    Running,
    /// Body returned normally.
    Success,
    /// Body failed or was interrupted by a restart.
    Failed,
}

impl ExecutionStatus {
    /// Stable string form used in the store layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ExecutionStatus::Pending),
            "RUNNING" => Some(ExecutionStatus::Running),
            "SUCCESS" => Some(ExecutionStatus::Success),
            "FAILED" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Failed)
    }
}

/// One persisted attempt to run a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Execution id.
    pub id: String,
    /// Owning job id.
    pub job_id: String,
    /// Current status.
    pub status: ExecutionStatus,
    /// When the execution started.
    pub started_at: DateTime<Utc>,
    /// When the execution reached a terminal status. Null while running.
    pub completed_at: Option<DateTime<Utc>>,
    /// Human-readable outcome, populated on success.
    pub result_message: Option<String>,
    /// Error text, populated on failure.
    pub error_message: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}
