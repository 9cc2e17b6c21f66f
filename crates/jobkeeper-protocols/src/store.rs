//! Store traits for job definitions and execution records.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::execution::{ExecutionRecord, ExecutionStatus};
use crate::job::{JobDefinition, JobSpec};

/// Persistence of job definitions.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new definition from a spec, assigning a fresh id.
    async fn create(&self, spec: JobSpec) -> Result<JobDefinition, StoreError>;

    /// Load a definition by id.
    async fn get(&self, id: &str) -> Result<Option<JobDefinition>, StoreError>;

    /// Load all definitions, ordered by name.
    async fn list(&self) -> Result<Vec<JobDefinition>, StoreError>;

    /// Load all enabled definitions.
    async fn list_enabled(&self) -> Result<Vec<JobDefinition>, StoreError>;

    /// Replace a definition's spec fields, bumping `updated_at`.
    async fn update(&self, id: &str, spec: JobSpec) -> Result<JobDefinition, StoreError>;

    /// Flip the enabled flag, bumping `updated_at`.
    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<JobDefinition, StoreError>;

    /// Delete a definition and every execution record it owns.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Persistence of execution records.
///
/// Terminal transitions are idempotent: once a record is SUCCESS or
/// FAILED, later transition calls are no-ops and the first write wins.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persist a new record with the given initial status (PENDING or
    /// RUNNING) and `started_at` = now.
    async fn create(
        &self,
        job_id: &str,
        initial: ExecutionStatus,
    ) -> Result<ExecutionRecord, StoreError>;

    /// Promote a PENDING record to RUNNING. No-op for any other status.
    async fn transition_to_running(&self, execution_id: &str) -> Result<(), StoreError>;

    /// Close a record as SUCCESS with an optional result message.
    async fn transition_to_success(
        &self,
        execution_id: &str,
        result_message: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Close a record as FAILED with an error message.
    async fn transition_to_failure(
        &self,
        execution_id: &str,
        error_message: &str,
    ) -> Result<(), StoreError>;

    /// Load a record by id.
    async fn get(&self, execution_id: &str) -> Result<Option<ExecutionRecord>, StoreError>;

    /// Load all records for a job, newest first.
    async fn list_by_job(&self, job_id: &str) -> Result<Vec<ExecutionRecord>, StoreError>;

    /// Load the most recent record for a job.
    async fn latest_by_job(&self, job_id: &str) -> Result<Option<ExecutionRecord>, StoreError>;

    /// Close every non-terminal record as FAILED with the given message.
    /// Returns the number of records closed. Called once at startup,
    /// before any schedule is installed.
    async fn close_stale(&self, error_message: &str) -> Result<u64, StoreError>;
}
