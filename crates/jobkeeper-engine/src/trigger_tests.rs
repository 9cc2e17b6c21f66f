
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_parse_cron_valid() {
        assert!(parse_cron("0 0 21 * * *").is_ok());
        assert!(parse_cron("* * * * * *").is_ok());
    }

    #[test]
    fn test_parse_cron_invalid() {
        let err = parse_cron("not a cron").unwrap_err();
        match err {
            EngineError::InvalidCron { expression, .. } => {
                assert_eq!(expression, "not a cron");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_schedule_invalid_expression_rejected() {
        let engine = TriggerEngine::new(chrono_tz::UTC);
        let result = engine.schedule("job-1", "every tuesday-ish", || {});
        assert!(matches!(result, Err(EngineError::InvalidCron { .. })));
        assert!(!engine.contains("job-1"));
    }

    #[tokio::test]
    async fn test_fires_on_cadence() {
        let engine = TriggerEngine::new(chrono_tz::UTC);
        let (count, callback) = counter();

        engine.schedule("job-1", "* * * * * *", callback).unwrap();
        sleep(std::time::Duration::from_millis(2300)).await;

        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 1, "expected at least one firing, got {fired}");
        assert!(fired <= 3, "expected at most three firings, got {fired}");
    }

    #[tokio::test]
    async fn test_schedule_then_cancel_never_fires() {
        let engine = TriggerEngine::new(chrono_tz::UTC);
        let (count, callback) = counter();

        engine.schedule("job-1", "* * * * * *", callback).unwrap();
        assert!(engine.cancel("job-1"));
        assert!(!engine.contains("job-1"));

        sleep(std::time::Duration::from_millis(1500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_without_trigger() {
        let engine = TriggerEngine::new(chrono_tz::UTC);
        assert!(!engine.cancel("never-scheduled"));
    }

    #[tokio::test]
    async fn test_rapid_reschedule_keeps_only_last_trigger() {
        let engine = TriggerEngine::new(chrono_tz::UTC);
        let (first_count, first_callback) = counter();
        let (second_count, second_callback) = counter();
        let (last_count, last_callback) = counter();

        engine.schedule("job-1", "* * * * * *", first_callback).unwrap();
        engine.schedule("job-1", "*/1 * * * * *", second_callback).unwrap();
        engine.schedule("job-1", "* * * * * *", last_callback).unwrap();
        assert_eq!(engine.active_count(), 1);
        assert_eq!(
            engine.installed_expression("job-1").as_deref(),
            Some("* * * * * *")
        );

        sleep(std::time::Duration::from_millis(2300)).await;
        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 0);
        assert!(last_count.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let engine = TriggerEngine::new(chrono_tz::UTC);
        let (count_a, callback_a) = counter();
        let (count_b, callback_b) = counter();

        engine.schedule("job-a", "* * * * * *", callback_a).unwrap();
        engine.schedule("job-b", "* * * * * *", callback_b).unwrap();
        assert_eq!(engine.active_count(), 2);

        engine.cancel_all();
        assert_eq!(engine.active_count(), 0);

        sleep(std::time::Duration::from_millis(1500)).await;
        assert_eq!(count_a.load(Ordering::SeqCst), 0);
        assert_eq!(count_b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_next_fire_after_spring_forward_keeps_local_hour() {
        let zone = chrono_tz::America::New_York;
        // The evening before the 2024 spring-forward transition.
        let after = zone.with_ymd_and_hms(2024, 3, 9, 22, 0, 0).unwrap();

        let next = next_fire_after("0 0 21 * * *", &after).unwrap().unwrap();
        assert_eq!(next.hour(), 21);
        assert_eq!(next.minute(), 0);
        assert_eq!((next.month(), next.day()), (3, 10));
        // The clocks jumped forward an hour overnight, so 21:00 local
        // arrives 22 wall-clock hours after 22:00 the previous evening.
        assert_eq!((next - after).num_hours(), 22);
    }

    #[test]
    fn test_next_fire_after_fall_back_keeps_local_hour() {
        let zone = chrono_tz::America::New_York;
        // The evening before the 2024 fall-back transition.
        let after = zone.with_ymd_and_hms(2024, 11, 2, 22, 0, 0).unwrap();

        let next = next_fire_after("0 0 21 * * *", &after).unwrap().unwrap();
        assert_eq!(next.hour(), 21);
        assert_eq!(next.minute(), 0);
        assert_eq!((next.month(), next.day()), (11, 3));
        assert_eq!((next - after).num_hours(), 24);
    }

    #[tokio::test]
    async fn test_next_fire_is_upcoming() {
        let engine = TriggerEngine::new(chrono_tz::UTC);
        let next = engine.next_fire("* * * * * *").unwrap().unwrap();
        let lead = next - Utc::now();
        assert!(lead <= chrono::Duration::seconds(2));
        assert!(lead >= chrono::Duration::seconds(-1));
    }

    #[test]
    fn test_timezone_accessor() {
        let engine = TriggerEngine::new(chrono_tz::Asia::Taipei);
        assert_eq!(engine.timezone(), chrono_tz::Asia::Taipei);
    }
