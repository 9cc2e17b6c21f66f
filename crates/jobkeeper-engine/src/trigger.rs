//! Trigger engine - one live cron trigger per enabled job.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use jobkeeper_protocols::error::EngineError;

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;

/// Parse a cron expression, mapping parse failures to a definition error.
pub fn parse_cron(expression: &str) -> Result<Schedule, EngineError> {
    Schedule::from_str(expression).map_err(|e| EngineError::InvalidCron {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// First fire time of an expression strictly after the given instant,
/// evaluated in that instant's timezone.
pub fn next_fire_after(
    expression: &str,
    after: &DateTime<Tz>,
) -> Result<Option<DateTime<Tz>>, EngineError> {
    let schedule = parse_cron(expression)?;
    Ok(schedule.after(after).next())
}

/// Cancellable reference to one job's live schedule registration.
struct TriggerHandle {
    cron_expression: String,
    cancel: CancellationToken,
    // Kept so the trigger task is owned somewhere; the loop exits on
    // cancellation, the handle is never awaited.
    _task: JoinHandle<()>,
}

impl TriggerHandle {
    fn cancel(self) {
        self.cancel.cancel();
    }
}

/// Holds one live cron trigger per scheduled job id.
///
/// Every next-fire time is recomputed from the cron expression in the
/// configured timezone, so daylight-saving transitions neither skip nor
/// double-fire a schedule. Rescheduling is always cancel-then-install
/// under the handle-map lock; the engine never updates a live trigger in
/// place.
pub struct TriggerEngine {
    timezone: Tz,
    handles: Mutex<HashMap<String, TriggerHandle>>,
}

impl TriggerEngine {
    /// Create an engine evaluating cron expressions in the given zone.
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// The zone cron expressions are evaluated in.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Install a trigger for a job, cancelling any existing one first.
    ///
    /// The callback fires once per cron occurrence. It must return
    /// quickly - executions are spawned elsewhere, never run inline on
    /// the trigger task.
    pub fn schedule(
        &self,
        job_id: &str,
        cron_expression: &str,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Result<(), EngineError> {
        let schedule = parse_cron(cron_expression)?;
        let cancel = CancellationToken::new();

        let mut handles = self.handles.lock();
        if let Some(old) = handles.remove(job_id) {
            debug!(job_id = %job_id, "cancelling previous trigger before install");
            old.cancel();
        }

        let task = tokio::spawn(Self::run_trigger(
            job_id.to_string(),
            schedule,
            self.timezone,
            cancel.clone(),
            callback,
        ));
        handles.insert(
            job_id.to_string(),
            TriggerHandle {
                cron_expression: cron_expression.to_string(),
                cancel,
                _task: task,
            },
        );
        debug!(job_id = %job_id, cron = %cron_expression, "trigger installed");
        Ok(())
    }

    /// Cancel a job's trigger. Returns whether one was live. Future
    /// firings stop; an already-running execution is not interrupted.
    pub fn cancel(&self, job_id: &str) -> bool {
        let handle = self.handles.lock().remove(job_id);
        match handle {
            Some(handle) => {
                handle.cancel();
                debug!(job_id = %job_id, "trigger cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every live trigger (process shutdown).
    pub fn cancel_all(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        let count = handles.len();
        for (_, handle) in handles {
            handle.cancel();
        }
        if count > 0 {
            debug!(count, "all triggers cancelled");
        }
    }

    /// Whether a trigger is live for this job id.
    pub fn contains(&self, job_id: &str) -> bool {
        self.handles.lock().contains_key(job_id)
    }

    /// The cron expression a job's live trigger was installed with.
    pub fn installed_expression(&self, job_id: &str) -> Option<String> {
        self.handles
            .lock()
            .get(job_id)
            .map(|h| h.cron_expression.clone())
    }

    /// Number of live triggers.
    pub fn active_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Next fire time of an expression from now, in UTC.
    pub fn next_fire(&self, cron_expression: &str) -> Result<Option<DateTime<Utc>>, EngineError> {
        let now = Utc::now().with_timezone(&self.timezone);
        Ok(next_fire_after(cron_expression, &now)?.map(|t| t.with_timezone(&Utc)))
    }

    async fn run_trigger(
        job_id: String,
        schedule: Schedule,
        timezone: Tz,
        cancel: CancellationToken,
        callback: impl Fn() + Send + Sync + 'static,
    ) {
        loop {
            let now = Utc::now().with_timezone(&timezone);
            let next = match schedule.after(&now).next() {
                Some(next) => next,
                None => {
                    debug!(job_id = %job_id, "no upcoming fire time, trigger retiring");
                    break;
                }
            };
            let delay = (next.with_timezone(&Utc) - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    debug!(job_id = %job_id, fired_at = %next.to_rfc3339(), "trigger fired");
                    callback();
                }
            }
        }
    }
}

impl Drop for TriggerEngine {
    fn drop(&mut self) {
        for (_, handle) in self.handles.lock().drain() {
            handle.cancel.cancel();
        }
    }
}
