
    use super::*;
    use async_trait::async_trait;
    use jobkeeper_protocols::error::JobError;
    use jobkeeper_protocols::execution::ExecutionRecord;
    use jobkeeper_protocols::job::JobSpec;
    use jobkeeper_store::MemoryExecutionStore;
    use std::time::Duration;
    use tokio::time::sleep;

    struct MessageBody(&'static str);

    #[async_trait]
    impl Runnable for MessageBody {
        async fn run(&self, ctx: &ExecutionContext) -> Result<(), JobError> {
            ctx.set_message(self.0);
            Ok(())
        }
    }

    struct SilentBody;

    #[async_trait]
    impl Runnable for SilentBody {
        async fn run(&self, _ctx: &ExecutionContext) -> Result<(), JobError> {
            Ok(())
        }
    }

    struct FailingBody;

    #[async_trait]
    impl Runnable for FailingBody {
        async fn run(&self, _ctx: &ExecutionContext) -> Result<(), JobError> {
            Err(JobError::failed("boom"))
        }
    }

    struct PanickingBody;

    #[async_trait]
    impl Runnable for PanickingBody {
        async fn run(&self, _ctx: &ExecutionContext) -> Result<(), JobError> {
            panic!("kaboom");
        }
    }

    struct SlowBody(Duration);

    #[async_trait]
    impl Runnable for SlowBody {
        async fn run(&self, ctx: &ExecutionContext) -> Result<(), JobError> {
            sleep(self.0).await;
            ctx.set_message("slept well");
            Ok(())
        }
    }

    fn definition(key: &str) -> JobDefinition {
        JobDefinition::from_spec("job-1", JobSpec::new("test job", key, "* * * * * *"))
    }

    fn executor_with(
        key: &str,
        body: Arc<dyn Runnable>,
    ) -> (JobExecutor, Arc<MemoryExecutionStore>) {
        let registry = Arc::new(RunnableRegistry::new());
        registry.register(key, body);
        let store = Arc::new(MemoryExecutionStore::new());
        (JobExecutor::new(registry, store.clone()), store)
    }

    async fn wait_for_terminal(
        store: &Arc<MemoryExecutionStore>,
        execution_id: &str,
    ) -> ExecutionRecord {
        for _ in 0..200 {
            let record = store.get(execution_id).await.unwrap().unwrap();
            if record.status.is_terminal() {
                return record;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("execution {execution_id} never reached a terminal state");
    }

    #[tokio::test]
    async fn test_manual_success_with_message() {
        let (executor, store) = executor_with("sync", Arc::new(MessageBody("synced 3 feeds")));
        let def = definition("sync");

        let execution_id = executor.launch(&def, ExecutionKind::Manual).await.unwrap();
        let record = wait_for_terminal(&store, &execution_id).await;

        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(record.result_message.as_deref(), Some("synced 3 feeds"));
        assert!(record.error_message.is_none());
        assert!(record.completed_at.is_some());
        assert_eq!(store.list_by_job(&def.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_default_messages_per_kind() {
        let (executor, store) = executor_with("quiet", Arc::new(SilentBody));
        let def = definition("quiet");

        let manual = executor.launch(&def, ExecutionKind::Manual).await.unwrap();
        let record = wait_for_terminal(&store, &manual).await;
        assert_eq!(record.result_message.as_deref(), Some("manual run completed"));

        let scheduled = executor.launch(&def, ExecutionKind::Scheduled).await.unwrap();
        let record = wait_for_terminal(&store, &scheduled).await;
        assert_eq!(
            record.result_message.as_deref(),
            Some("scheduled run completed")
        );
    }

    #[tokio::test]
    async fn test_failing_body_records_error() {
        let (executor, store) = executor_with("broken", Arc::new(FailingBody));
        let def = definition("broken");

        let execution_id = executor.launch(&def, ExecutionKind::Manual).await.unwrap();
        let record = wait_for_terminal(&store, &execution_id).await;

        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.error_message.as_deref().unwrap().contains("boom"));
        assert!(record.result_message.is_none());
        assert!(record.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_panicking_body_records_failure() {
        let (executor, store) = executor_with("explosive", Arc::new(PanickingBody));
        let def = definition("explosive");

        let execution_id = executor.launch(&def, ExecutionKind::Scheduled).await.unwrap();
        let record = wait_for_terminal(&store, &execution_id).await;

        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.error_message.as_deref().unwrap().contains("kaboom"));
    }

    #[tokio::test]
    async fn test_unknown_runnable_creates_no_record() {
        let (executor, store) = executor_with("known", Arc::new(SilentBody));
        let def = definition("unknown");

        let result = executor.launch(&def, ExecutionKind::Manual).await;
        assert!(matches!(result, Err(EngineError::RunnableNotFound(_))));
        assert!(store.list_by_job(&def.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_launches_yield_independent_records() {
        let (executor, store) =
            executor_with("slow", Arc::new(SlowBody(Duration::from_millis(200))));
        let def = definition("slow");

        let first = executor.launch(&def, ExecutionKind::Manual).await.unwrap();
        let second = executor.launch(&def, ExecutionKind::Manual).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(executor.running_count(&def.id), 2);

        let first = wait_for_terminal(&store, &first).await;
        let second = wait_for_terminal(&store, &second).await;
        assert_eq!(first.status, ExecutionStatus::Success);
        assert_eq!(second.status, ExecutionStatus::Success);
        assert_eq!(store.list_by_job(&def.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_skip_if_running_rejects_second_launch() {
        let (executor, store) =
            executor_with("slow", Arc::new(SlowBody(Duration::from_millis(300))));
        let def = JobDefinition::from_spec(
            "job-1",
            JobSpec::new("test job", "slow", "* * * * * *")
                .with_concurrency(ConcurrencyPolicy::SkipIfRunning),
        );

        let first = executor.launch(&def, ExecutionKind::Manual).await.unwrap();
        let second = executor.launch(&def, ExecutionKind::Scheduled).await;
        assert!(matches!(second, Err(EngineError::AlreadyRunning(_))));
        assert_eq!(store.list_by_job(&def.id).await.unwrap().len(), 1);

        wait_for_terminal(&store, &first).await;
        assert_eq!(executor.running_count(&def.id), 0);

        // A new launch is accepted once the previous execution finished.
        let third = executor.launch(&def, ExecutionKind::Manual).await.unwrap();
        wait_for_terminal(&store, &third).await;
    }

    #[tokio::test]
    async fn test_in_flight_slot_released_after_failure() {
        let (executor, store) = executor_with("broken", Arc::new(FailingBody));
        let def = JobDefinition::from_spec(
            "job-1",
            JobSpec::new("test job", "broken", "* * * * * *")
                .with_concurrency(ConcurrencyPolicy::SkipIfRunning),
        );

        let first = executor.launch(&def, ExecutionKind::Manual).await.unwrap();
        wait_for_terminal(&store, &first).await;
        assert_eq!(executor.running_count(&def.id), 0);

        let second = executor.launch(&def, ExecutionKind::Manual).await.unwrap();
        wait_for_terminal(&store, &second).await;
    }
