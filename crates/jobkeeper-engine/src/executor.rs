//! Execution wrapper shared by the scheduled and manual trigger paths.

use dashmap::DashMap;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use jobkeeper_protocols::error::EngineError;
use jobkeeper_protocols::execution::ExecutionStatus;
use jobkeeper_protocols::job::{ConcurrencyPolicy, ExecutionKind, JobDefinition};
use jobkeeper_protocols::runnable::{ExecutionContext, Runnable};
use jobkeeper_protocols::store::ExecutionStore;

use crate::registry::RunnableRegistry;

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

/// Runs job bodies, one fresh task per execution, and closes out their
/// execution records.
///
/// A hung body occupies its own task forever (no timeout is imposed) but
/// cannot delay trigger firings or other jobs. Failures writing the
/// record are logged and swallowed: bookkeeping must never abort a body
/// that has already produced side effects.
#[derive(Clone)]
pub struct JobExecutor {
    registry: Arc<RunnableRegistry>,
    executions: Arc<dyn ExecutionStore>,
    in_flight: Arc<DashMap<String, usize>>,
}

impl JobExecutor {
    /// Create an executor over a registry and an execution store.
    pub fn new(registry: Arc<RunnableRegistry>, executions: Arc<dyn ExecutionStore>) -> Self {
        Self {
            registry,
            executions,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Number of executions currently in flight for a job.
    pub fn running_count(&self, job_id: &str) -> usize {
        self.in_flight.get(job_id).map(|c| *c).unwrap_or(0)
    }

    /// Start one execution of a job and return its record id.
    ///
    /// The record is created before this returns; the body runs on its
    /// own spawned task. Under [`ConcurrencyPolicy::SkipIfRunning`] a
    /// launch that finds the job in flight returns
    /// [`EngineError::AlreadyRunning`] and creates no record.
    pub async fn launch(
        &self,
        definition: &JobDefinition,
        kind: ExecutionKind,
    ) -> Result<String, EngineError> {
        let runnable = self
            .registry
            .get(&definition.registry_key)
            .ok_or_else(|| EngineError::RunnableNotFound(definition.registry_key.clone()))?;

        let guard = self
            .acquire(&definition.id, definition.concurrency)
            .ok_or_else(|| EngineError::AlreadyRunning(definition.id.clone()))?;

        // The manual path persists PENDING before returning the id and
        // promotes to RUNNING from the execution task; scheduled firings
        // go straight to RUNNING.
        let initial = match kind {
            ExecutionKind::Manual => ExecutionStatus::Pending,
            ExecutionKind::Scheduled => ExecutionStatus::Running,
        };
        let record = self.executions.create(&definition.id, initial).await?;
        let execution_id = record.id.clone();

        let executor = self.clone();
        let definition = definition.clone();
        tokio::spawn(async move {
            executor
                .drive(definition, runnable, execution_id, kind, guard)
                .await;
        });

        Ok(record.id)
    }

    async fn drive(
        &self,
        definition: JobDefinition,
        runnable: Arc<dyn Runnable>,
        execution_id: String,
        kind: ExecutionKind,
        guard: InFlightGuard,
    ) {
        // Held until the execution is fully closed out.
        let _guard = guard;

        if kind == ExecutionKind::Manual {
            if let Err(e) = self.executions.transition_to_running(&execution_id).await {
                error!(
                    job = %definition.name,
                    execution_id = %execution_id,
                    "failed to mark execution running: {e}"
                );
            }
        }

        info!(
            job = %definition.name,
            execution_id = %execution_id,
            "{} started",
            kind.label()
        );

        let ctx = ExecutionContext::new(&definition.id, &execution_id);
        let outcome = AssertUnwindSafe(runnable.run(&ctx)).catch_unwind().await;

        match outcome {
            Ok(Ok(())) => {
                let message = ctx
                    .take_message()
                    .unwrap_or_else(|| format!("{} completed", kind.label()));
                if let Err(e) = self
                    .executions
                    .transition_to_success(&execution_id, Some(&message))
                    .await
                {
                    error!(
                        job = %definition.name,
                        execution_id = %execution_id,
                        "failed to record success: {e}"
                    );
                }
                info!(
                    job = %definition.name,
                    execution_id = %execution_id,
                    "{} succeeded",
                    kind.label()
                );
            }
            Ok(Err(err)) => {
                self.close_failed(&definition, &execution_id, kind, err.to_string())
                    .await;
            }
            Err(panic) => {
                self.close_failed(&definition, &execution_id, kind, panic_message(panic))
                    .await;
            }
        }
    }

    async fn close_failed(
        &self,
        definition: &JobDefinition,
        execution_id: &str,
        kind: ExecutionKind,
        error_message: String,
    ) {
        warn!(
            job = %definition.name,
            execution_id = %execution_id,
            "{} failed: {error_message}",
            kind.label()
        );
        if let Err(e) = self
            .executions
            .transition_to_failure(execution_id, &error_message)
            .await
        {
            error!(
                job = %definition.name,
                execution_id = %execution_id,
                "failed to record failure: {e}"
            );
        }
    }

    fn acquire(&self, job_id: &str, policy: ConcurrencyPolicy) -> Option<InFlightGuard> {
        let mut count = self.in_flight.entry(job_id.to_string()).or_insert(0);
        if policy == ConcurrencyPolicy::SkipIfRunning && *count > 0 {
            return None;
        }
        *count += 1;
        drop(count);
        Some(InFlightGuard {
            job_id: job_id.to_string(),
            in_flight: self.in_flight.clone(),
        })
    }
}

/// Releases a job's in-flight slot when its execution task ends, on
/// every exit path.
struct InFlightGuard {
    job_id: String,
    in_flight: Arc<DashMap<String, usize>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(mut count) = self.in_flight.get_mut(&self.job_id) {
            *count = count.saturating_sub(1);
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "job body panicked".to_string()
    }
}
