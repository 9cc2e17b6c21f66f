//! The job body contract and its per-execution result channel.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::JobError;

/// Per-execution context handed to a job body.
///
/// The body may leave a human-readable summary via [`set_message`]; the
/// execution wrapper takes it after the body returns and writes it to the
/// execution record. One context is built per execution and dropped with
/// it, so a message can never leak into another run.
///
/// [`set_message`]: ExecutionContext::set_message
pub struct ExecutionContext {
    job_id: String,
    execution_id: String,
    message: Mutex<Option<String>>,
}

impl ExecutionContext {
    /// Build a context for one execution.
    pub fn new(job_id: impl Into<String>, execution_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            execution_id: execution_id.into(),
            message: Mutex::new(None),
        }
    }

    /// Id of the job being executed.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Id of this execution's record.
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Leave a result summary for the execution record. A later call
    /// replaces an earlier one.
    pub fn set_message(&self, message: impl Into<String>) {
        *self.message.lock() = Some(message.into());
    }

    /// Take the result summary, clearing the slot.
    pub fn take_message(&self) -> Option<String> {
        self.message.lock().take()
    }
}

/// A named, side-effecting unit of work.
///
/// Implementations are registered once at startup and invoked by the
/// engine on scheduled firings and manual triggers. Bodies report an
/// optional outcome summary through the [`ExecutionContext`]; a returned
/// error closes the execution record as failed.
#[async_trait]
pub trait Runnable: Send + Sync {
    /// Execute the unit of work.
    async fn run(&self, ctx: &ExecutionContext) -> Result<(), JobError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_take_clears() {
        let ctx = ExecutionContext::new("job-1", "exec-1");
        assert!(ctx.take_message().is_none());

        ctx.set_message("synced 42 rows");
        assert_eq!(ctx.take_message().as_deref(), Some("synced 42 rows"));
        assert!(ctx.take_message().is_none());
    }

    #[test]
    fn test_message_last_write_wins() {
        let ctx = ExecutionContext::new("job-1", "exec-1");
        ctx.set_message("first");
        ctx.set_message("second");
        assert_eq!(ctx.take_message().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_runnable_object_safety() {
        struct Noop;

        #[async_trait]
        impl Runnable for Noop {
            async fn run(&self, ctx: &ExecutionContext) -> Result<(), JobError> {
                ctx.set_message("done");
                Ok(())
            }
        }

        let runnable: std::sync::Arc<dyn Runnable> = std::sync::Arc::new(Noop);
        let ctx = ExecutionContext::new("job-1", "exec-1");
        runnable.run(&ctx).await.unwrap();
        assert_eq!(ctx.take_message().as_deref(), Some("done"));
    }
}
