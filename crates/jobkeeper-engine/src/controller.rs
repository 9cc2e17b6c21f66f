//! Job controller - reconciles stored definitions with live schedule
//! state.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use jobkeeper_protocols::error::{EngineError, StoreError};
use jobkeeper_protocols::execution::ExecutionRecord;
use jobkeeper_protocols::job::{ExecutionKind, JobDefinition, JobSpec};
use jobkeeper_protocols::store::{ExecutionStore, JobStore};

use crate::config::EngineConfig;
use crate::executor::JobExecutor;
use crate::registry::RunnableRegistry;
use crate::trigger::{parse_cron, TriggerEngine};

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;

/// Orchestrates create/update/delete/toggle/execute-now against the
/// trigger engine and the stores.
///
/// One instance owns all scheduler state: constructed at startup,
/// [`initialize_all`] called once, [`shutdown`] cancels every live
/// trigger. There is no ambient global state; tests build isolated
/// instances.
///
/// Definition errors (invalid cron, unknown registry key, missing job)
/// surface synchronously from these methods and abort before any live
/// schedule state changes. Execution failures never do - they are only
/// visible through the execution history.
///
/// [`initialize_all`]: JobController::initialize_all
/// [`shutdown`]: JobController::shutdown
pub struct JobController {
    jobs: Arc<dyn JobStore>,
    executions: Arc<dyn ExecutionStore>,
    registry: Arc<RunnableRegistry>,
    triggers: TriggerEngine,
    executor: JobExecutor,
}

impl JobController {
    /// Build a controller over a registry and stores.
    pub fn new(
        config: EngineConfig,
        registry: Arc<RunnableRegistry>,
        jobs: Arc<dyn JobStore>,
        executions: Arc<dyn ExecutionStore>,
    ) -> Self {
        Self {
            jobs,
            executions: executions.clone(),
            registry: registry.clone(),
            triggers: TriggerEngine::new(config.timezone),
            executor: JobExecutor::new(registry, executions),
        }
    }

    /// Validate and persist a new job; schedule it when enabled.
    pub async fn create_job(&self, spec: JobSpec) -> Result<JobDefinition, EngineError> {
        self.validate(&spec)?;
        let def = self.jobs.create(spec).await?;
        if def.enabled {
            self.install(&def)?;
        }
        info!(job = %def.name, job_id = %def.id, enabled = def.enabled, "job created");
        Ok(def)
    }

    /// Validate and persist a changed definition; always cancel the old
    /// trigger, then reschedule when enabled.
    pub async fn update_job(&self, id: &str, spec: JobSpec) -> Result<JobDefinition, EngineError> {
        self.validate(&spec)?;
        let def = self
            .jobs
            .update(id, spec)
            .await
            .map_err(|e| missing_as_job_not_found(e, id))?;

        self.triggers.cancel(id);
        if def.enabled {
            self.install(&def)?;
        }
        info!(job = %def.name, job_id = %def.id, enabled = def.enabled, "job updated");
        Ok(def)
    }

    /// Cancel the trigger and delete the definition with its execution
    /// history.
    pub async fn delete_job(&self, id: &str) -> Result<(), EngineError> {
        let def = self
            .jobs
            .get(id)
            .await?
            .ok_or_else(|| EngineError::JobNotFound(id.to_string()))?;

        self.triggers.cancel(id);
        self.jobs.delete(id).await?;
        info!(job = %def.name, job_id = %id, "job deleted");
        Ok(())
    }

    /// Persist the enabled flag; schedule or cancel accordingly.
    pub async fn toggle_job(&self, id: &str, enabled: bool) -> Result<JobDefinition, EngineError> {
        let def = self
            .jobs
            .set_enabled(id, enabled)
            .await
            .map_err(|e| missing_as_job_not_found(e, id))?;

        if enabled {
            self.triggers.cancel(id);
            self.install(&def)?;
        } else {
            self.triggers.cancel(id);
        }
        info!(job = %def.name, job_id = %id, enabled, "job toggled");
        Ok(def)
    }

    /// Trigger one execution immediately, returning its record id before
    /// the body completes. Works for disabled jobs too and is
    /// independent of any scheduled firing of the same job.
    pub async fn execute_now(&self, id: &str) -> Result<String, EngineError> {
        let def = self
            .jobs
            .get(id)
            .await?
            .ok_or_else(|| EngineError::JobNotFound(id.to_string()))?;
        self.executor.launch(&def, ExecutionKind::Manual).await
    }

    /// Startup reconciliation: close records left non-terminal by a
    /// previous process, then schedule every enabled definition.
    /// Definitions that no longer validate are logged and skipped so one
    /// bad row cannot block the rest. Returns the number scheduled.
    pub async fn initialize_all(&self) -> Result<usize, EngineError> {
        let stale = self
            .executions
            .close_stale("interrupted by process restart")
            .await?;
        if stale > 0 {
            warn!(count = stale, "closed stale execution records from previous process");
        }

        let mut scheduled = 0;
        for def in self.jobs.list_enabled().await? {
            match self.install(&def) {
                Ok(()) => scheduled += 1,
                Err(e) => {
                    error!(job = %def.name, job_id = %def.id, "failed to schedule at startup: {e}");
                }
            }
        }
        info!(count = scheduled, "scheduler initialized");
        Ok(scheduled)
    }

    /// Cancel every live trigger. In-flight executions finish on their
    /// own tasks.
    pub fn shutdown(&self) {
        self.triggers.cancel_all();
        info!("scheduler shut down");
    }

    /// All job definitions.
    pub async fn list_jobs(&self) -> Result<Vec<JobDefinition>, EngineError> {
        Ok(self.jobs.list().await?)
    }

    /// One job definition by id.
    pub async fn get_job(&self, id: &str) -> Result<Option<JobDefinition>, EngineError> {
        Ok(self.jobs.get(id).await?)
    }

    /// A job's execution records, newest first.
    pub async fn list_executions(
        &self,
        job_id: &str,
    ) -> Result<Vec<ExecutionRecord>, EngineError> {
        Ok(self.executions.list_by_job(job_id).await?)
    }

    /// A job's most recent execution record.
    pub async fn latest_execution(
        &self,
        job_id: &str,
    ) -> Result<Option<ExecutionRecord>, EngineError> {
        Ok(self.executions.latest_by_job(job_id).await?)
    }

    /// One execution record by id.
    pub async fn get_execution(
        &self,
        execution_id: &str,
    ) -> Result<Option<ExecutionRecord>, EngineError> {
        Ok(self.executions.get(execution_id).await?)
    }

    /// When an enabled job will next fire, in UTC. `None` for disabled
    /// jobs or expressions with no upcoming occurrence.
    pub async fn next_fire_time(&self, id: &str) -> Result<Option<DateTime<Utc>>, EngineError> {
        let def = self
            .jobs
            .get(id)
            .await?
            .ok_or_else(|| EngineError::JobNotFound(id.to_string()))?;
        if !def.enabled {
            return Ok(None);
        }
        self.triggers.next_fire(&def.cron_expression)
    }

    /// Whether a live trigger is installed for this job id.
    pub fn is_scheduled(&self, id: &str) -> bool {
        self.triggers.contains(id)
    }

    fn validate(&self, spec: &JobSpec) -> Result<(), EngineError> {
        parse_cron(&spec.cron_expression)?;
        if !self.registry.contains(&spec.registry_key) {
            return Err(EngineError::RunnableNotFound(spec.registry_key.clone()));
        }
        Ok(())
    }

    fn install(&self, def: &JobDefinition) -> Result<(), EngineError> {
        if !self.registry.contains(&def.registry_key) {
            return Err(EngineError::RunnableNotFound(def.registry_key.clone()));
        }

        let executor = self.executor.clone();
        let def_for_firing = def.clone();
        self.triggers
            .schedule(&def.id, &def.cron_expression, move || {
                let executor = executor.clone();
                let def = def_for_firing.clone();
                tokio::spawn(async move {
                    match executor.launch(&def, ExecutionKind::Scheduled).await {
                        Ok(_) => {}
                        Err(EngineError::AlreadyRunning(_)) => {
                            info!(
                                job = %def.name,
                                "scheduled firing skipped, previous execution still running"
                            );
                        }
                        Err(e) => {
                            error!(job = %def.name, "failed to launch scheduled execution: {e}");
                        }
                    }
                });
            })
    }
}

fn missing_as_job_not_found(err: StoreError, id: &str) -> EngineError {
    match err {
        StoreError::NotFound(_) => EngineError::JobNotFound(id.to_string()),
        other => EngineError::Store(other),
    }
}
