//! In-memory stores for tests and lightweight embedding.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use jobkeeper_protocols::error::StoreError;
use jobkeeper_protocols::execution::{ExecutionRecord, ExecutionStatus};
use jobkeeper_protocols::job::{JobDefinition, JobSpec};
use jobkeeper_protocols::store::{ExecutionStore, JobStore};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// In-memory job definition store.
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, JobDefinition>>,
}

impl MemoryJobStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, spec: JobSpec) -> Result<JobDefinition, StoreError> {
        let def = JobDefinition::from_spec(uuid::Uuid::new_v4().to_string(), spec);
        let mut jobs = self.jobs.write().await;
        jobs.insert(def.id.clone(), def.clone());
        Ok(def)
    }

    async fn get(&self, id: &str) -> Result<Option<JobDefinition>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<JobDefinition>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut defs: Vec<JobDefinition> = jobs.values().cloned().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(defs)
    }

    async fn list_enabled(&self) -> Result<Vec<JobDefinition>, StoreError> {
        let mut defs = self.list().await?;
        defs.retain(|d| d.enabled);
        Ok(defs)
    }

    async fn update(&self, id: &str, spec: JobSpec) -> Result<JobDefinition, StoreError> {
        let mut jobs = self.jobs.write().await;
        let def = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        def.apply_spec(spec);
        Ok(def.clone())
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<JobDefinition, StoreError> {
        let mut jobs = self.jobs.write().await;
        let def = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        def.enabled = enabled;
        def.updated_at = Utc::now();
        Ok(def.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(id);
        Ok(())
    }
}

/// In-memory execution record store. Records keep insertion order, so
/// newest-first listings do not depend on timestamp granularity.
pub struct MemoryExecutionStore {
    records: RwLock<Vec<ExecutionRecord>>,
}

impl MemoryExecutionStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryExecutionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn create(
        &self,
        job_id: &str,
        initial: ExecutionStatus,
    ) -> Result<ExecutionRecord, StoreError> {
        let now = Utc::now();
        let record = ExecutionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            status: initial,
            started_at: now,
            completed_at: None,
            result_message: None,
            error_message: None,
            created_at: now,
        };
        let mut records = self.records.write().await;
        records.push(record.clone());
        Ok(record)
    }

    async fn transition_to_running(&self, execution_id: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.iter_mut().find(|r| r.id == execution_id) {
            if record.status == ExecutionStatus::Pending {
                record.status = ExecutionStatus::Running;
                record.started_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn transition_to_success(
        &self,
        execution_id: &str,
        result_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.iter_mut().find(|r| r.id == execution_id) {
            if !record.status.is_terminal() {
                record.status = ExecutionStatus::Success;
                record.completed_at = Some(Utc::now());
                record.result_message = result_message.map(|m| m.to_string());
            }
        }
        Ok(())
    }

    async fn transition_to_failure(
        &self,
        execution_id: &str,
        error_message: &str,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.iter_mut().find(|r| r.id == execution_id) {
            if !record.status.is_terminal() {
                record.status = ExecutionStatus::Failed;
                record.completed_at = Some(Utc::now());
                record.error_message = Some(error_message.to_string());
            }
        }
        Ok(())
    }

    async fn get(&self, execution_id: &str) -> Result<Option<ExecutionRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == execution_id).cloned())
    }

    async fn list_by_job(&self, job_id: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn latest_by_job(&self, job_id: &str) -> Result<Option<ExecutionRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.iter().rev().find(|r| r.job_id == job_id).cloned())
    }

    async fn close_stale(&self, error_message: &str) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let mut closed = 0u64;
        for record in records.iter_mut() {
            if !record.status.is_terminal() {
                record.status = ExecutionStatus::Failed;
                record.completed_at = Some(Utc::now());
                record.error_message = Some(error_message.to_string());
                closed += 1;
            }
        }
        Ok(closed)
    }
}
