//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 同步 / 异步分发场景测试
//! - 配置驱动的 Notifier 端到端测试

#[cfg(test)]
mod support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use notifier::{async_trait, Event, EventHandler, HandlerResult};

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct Ping {
        pub x: i32,
    }

    #[derive(Debug)]
    pub struct Pong;

    pub fn ping(x: i32) -> Event<Ping> {
        Event::new("p", Ping { x }).unwrap()
    }

    /// Records every payload it sees; fails when `fail` is set
    pub struct Recorder {
        pub calls: Arc<AtomicUsize>,
        pub seen: Arc<Mutex<Vec<Ping>>>,
        pub fail: bool,
    }

    impl Recorder {
        pub fn new(fail: bool) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(Mutex::new(Vec::new())),
                fail,
            }
        }
    }

    #[async_trait]
    impl EventHandler<Ping> for Recorder {
        async fn handle_event(&self, event: &Event<Ping>) -> HandlerResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(event.data().clone());
            if self.fail {
                return Err("recorder failure".into());
            }
            Ok(())
        }
    }

    /// Only accepts events whose payload is even
    pub struct EvenOnly {
        pub calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler<Ping> for EvenOnly {
        fn can_handle(&self, event: &Event<Ping>) -> bool {
            event.data().x % 2 == 0
        }

        async fn handle_event(&self, _event: &Event<Ping>) -> HandlerResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Sleeps before counting
    pub struct Slow {
        pub delay: Duration,
        pub calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler<Ping> for Slow {
        async fn handle_event(&self, _event: &Event<Ping>) -> HandlerResult {
            tokio::time::sleep(self.delay).await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub struct Failing;

    #[async_trait]
    impl EventHandler<Ping> for Failing {
        async fn handle_event(&self, _event: &Event<Ping>) -> HandlerResult {
            Err("boom".into())
        }
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{ContractError, Event, HeraldConfig};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert!(HeraldConfig::default().dispatch.mode == contracts::DispatchMode::Sync);
    }

    #[test]
    fn test_event_rejects_blank_name() {
        let err = Event::new(" \t", 1u8).unwrap_err();
        assert!(matches!(err, ContractError::InvalidArgument { .. }));
    }
}

/// Scenarios A-D
#[cfg(test)]
mod scenario_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use notifier::{
        async_trait, AsyncOptions, EmptyResolver, Event, EventHandler, HandlerResult,
        NotifierBuilder, NotifyError, Options,
    };

    use crate::support::*;

    #[tokio::test]
    async fn test_scenario_a_single_handler() {
        let handler = Recorder::new(false);
        let calls = Arc::clone(&handler.calls);
        let seen = Arc::clone(&handler.seen);

        let mut builder = NotifierBuilder::new();
        builder
            .register_handler_instance::<Ping, _>(handler)
            .unwrap();
        let notifier = builder.build(Arc::new(EmptyResolver)).unwrap();

        notifier.notify(ping(1)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec![Ping { x: 1 }]);
    }

    #[tokio::test]
    async fn test_scenario_b_unregistered_type() {
        let mut builder = NotifierBuilder::new();
        builder
            .register_handler_instance::<Ping, _>(Recorder::new(false))
            .unwrap();
        let notifier = builder.build(Arc::new(EmptyResolver)).unwrap();

        let err = notifier
            .notify(Event::new("q", Pong).unwrap())
            .await
            .unwrap_err();
        match err {
            NotifyError::HandlerNotFound { event_type } => assert!(event_type.ends_with("Pong")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    struct H1 {
        calls: Arc<AtomicUsize>,
    }

    struct H2 {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler<Ping> for H1 {
        async fn handle_event(&self, _event: &Event<Ping>) -> HandlerResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl EventHandler<Ping> for H2 {
        async fn handle_event(&self, _event: &Event<Ping>) -> HandlerResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("boom".into())
        }
    }

    #[tokio::test]
    async fn test_scenario_c_one_of_two_fails() {
        let h1_calls = Arc::new(AtomicUsize::new(0));
        let h2_calls = Arc::new(AtomicUsize::new(0));

        let mut builder = NotifierBuilder::new();
        builder
            .register_handler_instance::<Ping, _>(H1 {
                calls: Arc::clone(&h1_calls),
            })
            .unwrap()
            .register_handler_instance::<Ping, _>(H2 {
                calls: Arc::clone(&h2_calls),
            })
            .unwrap();
        let notifier = builder.build(Arc::new(EmptyResolver)).unwrap();

        let err = notifier.notify(ping(1)).await.unwrap_err();

        assert_eq!(h1_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h2_calls.load(Ordering::SeqCst), 1);

        let failures = err.handler_failures().unwrap();
        assert_eq!(failures.len(), 1);
        let failure = failures.iter().next().unwrap();
        assert!(failure.handler_type().ends_with("H2"));
        assert_eq!(failure.cause().to_string(), "boom");
        assert_eq!(failure.event::<Ping>().unwrap().data(), &Ping { x: 1 });
    }

    #[tokio::test]
    async fn test_scenario_d_async_returns_before_handler() {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut builder = NotifierBuilder::new();
        builder
            .configure(Options::asynchronous(AsyncOptions::default()))
            .unwrap()
            .register_handler_instance::<Ping, _>(Slow {
                delay: Duration::from_millis(500),
                calls: Arc::clone(&calls),
            })
            .unwrap();
        let notifier = builder.build(Arc::new(EmptyResolver)).unwrap();

        let started = Instant::now();
        notifier.notify(ping(1)).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

#[cfg(test)]
mod property_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{ContractError, DispatchFailure, HandlerFailure, TaskOutcome, TaskStatus};
    use notifier::{
        AsyncOptions, EmptyResolver, FactoryResolver, NotifierBuilder, NotifyError, Options,
    };
    use tokio::sync::mpsc;

    use crate::support::*;

    #[tokio::test]
    async fn test_handler_not_found_invokes_nothing() {
        let handler = Recorder::new(false);
        let calls = Arc::clone(&handler.calls);

        let mut builder = NotifierBuilder::new();
        builder.register_handler_instance::<Ping, _>(handler).unwrap();
        let notifier = builder.build(Arc::new(EmptyResolver)).unwrap();

        let result = notifier.notify(contracts::Event::new("n", 7u64).unwrap()).await;
        assert!(matches!(result, Err(NotifyError::HandlerNotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.metrics().snapshot().handler_invocations, 0);
    }

    #[tokio::test]
    async fn test_rejected_handlers_never_run() {
        let even_calls = Arc::new(AtomicUsize::new(0));
        let recorder = Recorder::new(false);
        let recorder_calls = Arc::clone(&recorder.calls);

        // Filter placed after the recorder on purpose; order must not matter
        let mut builder = NotifierBuilder::new();
        builder
            .register_handler_instance::<Ping, _>(recorder)
            .unwrap()
            .register_handler_instance::<Ping, _>(EvenOnly {
                calls: Arc::clone(&even_calls),
            })
            .unwrap();
        let notifier = builder.build(Arc::new(EmptyResolver)).unwrap();

        for x in 1..=5 {
            notifier.notify(ping(x)).await.unwrap();
        }

        assert_eq!(recorder_calls.load(Ordering::SeqCst), 5);
        assert_eq!(even_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_k_of_n_failures_reported() {
        for failing in 0..=4usize {
            let recorders: Vec<Recorder> = (0..4).map(|i| Recorder::new(i < failing)).collect();
            let counters: Vec<_> = recorders.iter().map(|r| Arc::clone(&r.calls)).collect();

            let mut builder = NotifierBuilder::new();
            for recorder in recorders {
                builder.register_handler_instance::<Ping, _>(recorder).unwrap();
            }
            let notifier = builder.build(Arc::new(EmptyResolver)).unwrap();

            let result = notifier.notify(ping(3)).await;
            for counter in &counters {
                assert_eq!(counter.load(Ordering::SeqCst), 1);
            }
            match result {
                Ok(()) => assert_eq!(failing, 0),
                Err(err) => assert_eq!(err.handler_failures().unwrap().len(), failing),
            }
        }
    }

    #[tokio::test]
    async fn test_every_consumer_runs_and_failures_aggregate() {
        let invoked = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel::<TaskOutcome>();

        let mut options = AsyncOptions::builder();
        for index in 0..3 {
            let invoked = Arc::clone(&invoked);
            options = options.error_consumer(move |failures: &[HandlerFailure]| {
                invoked.fetch_add(1, Ordering::SeqCst);
                assert_eq!(failures.len(), 1);
                if index == 1 {
                    return Err("consumer offline".into());
                }
                Ok(())
            });
        }
        let options = options
            .task_sink(move |outcome| {
                let _ = tx.send(outcome);
            })
            .build()
            .unwrap();

        let mut builder = NotifierBuilder::new();
        builder
            .configure(Options::asynchronous(options))
            .unwrap()
            .register_handler_instance::<Ping, _>(Failing)
            .unwrap();
        let notifier = builder.build(Arc::new(EmptyResolver)).unwrap();

        notifier.notify(ping(1)).await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(invoked.load(Ordering::SeqCst), 3);
        match outcome.status {
            TaskStatus::Faulted(DispatchFailure::Consumers(failures)) => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures.consumer_errors()[0].index, 1);
                assert_eq!(failures.handler_failures().len(), 1);
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_consumed_failures_complete_the_unit() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TaskOutcome>();
        let options = AsyncOptions::builder()
            .error_consumer(|_| Ok(()))
            .task_sink(move |outcome| {
                let _ = tx.send(outcome);
            })
            .build()
            .unwrap();

        let mut builder = NotifierBuilder::new();
        builder
            .configure(Options::asynchronous(options))
            .unwrap()
            .register_handler_instance::<Ping, _>(Failing)
            .unwrap();
        let notifier = builder.build(Arc::new(EmptyResolver)).unwrap();

        notifier.notify(ping(1)).await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(notifier.metrics().snapshot().handler_failures, 1);
    }

    #[tokio::test]
    async fn test_unobserved_failures_are_counted() {
        let mut builder = NotifierBuilder::new();
        builder
            .configure(Options::asynchronous(AsyncOptions::default()))
            .unwrap()
            .register_handler_instance::<Ping, _>(Failing)
            .unwrap();
        let notifier = builder.build(Arc::new(EmptyResolver)).unwrap();

        notifier.notify(ping(1)).await.unwrap();
        notifier.notify(ping(2)).await.unwrap();

        for _ in 0..100 {
            if notifier.metrics().snapshot().unobserved_failures == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let snapshot = notifier.metrics().snapshot();
        assert_eq!(snapshot.unobserved_failures, 2);
        assert_eq!(snapshot.faulted_units, 2);
    }

    #[tokio::test]
    async fn test_build_twice_rejected() {
        let mut builder = NotifierBuilder::new();
        builder
            .register_handler_instance::<Ping, _>(Recorder::new(false))
            .unwrap();
        builder.build(Arc::new(EmptyResolver)).unwrap();

        let err = builder.build(Arc::new(EmptyResolver)).unwrap_err();
        assert!(matches!(err, ContractError::AlreadyBuilt));
        assert!(matches!(
            builder.register_handler_instance::<Ping, _>(Recorder::new(false)),
            Err(ContractError::AlreadyBuilt)
        ));
    }

    #[test]
    fn test_duplicate_type_registration_rejected() {
        let mut builder = NotifierBuilder::new();
        builder.register_handler_type::<Ping, Failing>().unwrap();
        let err = builder.register_handler_type::<Ping, Failing>().unwrap_err();
        assert!(matches!(err, ContractError::DuplicateRegistration { .. }));
        assert_eq!(builder.handler_types_for::<Ping>().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lazy_handler_resolved_once_under_contention() {
        let created = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut resolver = FactoryResolver::new();
        {
            let created = Arc::clone(&created);
            let calls = Arc::clone(&calls);
            resolver.register::<Slow, _>(move || {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(Slow {
                    delay: Duration::from_millis(1),
                    calls: Arc::clone(&calls),
                })
            });
        }

        let mut builder = NotifierBuilder::new();
        builder.register_handler_type::<Ping, Slow>().unwrap();
        let notifier = builder.build(Arc::new(resolver)).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 0);

        let tasks: Vec<_> = (0..16)
            .map(|x| {
                let notifier = notifier.clone();
                tokio::spawn(async move { notifier.notify(ping(x)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    async fn test_unresolvable_handler_fails_notify() {
        let mut builder = NotifierBuilder::new();
        builder.register_handler_type::<Ping, Slow>().unwrap();
        let notifier = builder.build(Arc::new(FactoryResolver::new())).unwrap();

        let err = notifier.notify(ping(1)).await.unwrap_err();
        assert!(matches!(err, NotifyError::Resolution { .. }));
    }
}

#[cfg(test)]
mod config_tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use notifier::{
        async_trait, AsyncOptions, EmptyResolver, Event, EventHandler, HandlerResult,
        NotifierBuilder, Options,
    };
    use observability::{aggregating_task_sink, OutcomeAggregator};

    use crate::support::*;

    const DEDICATED_TOML: &str = r#"
[dispatch]
mode = "async"

[dispatch.scheduler]
kind = "dedicated"
worker_threads = 2
thread_name = "herald-it"

[logging]
format = "compact"
level = "debug"
"#;

    /// Remembers the thread it ran on
    struct ThreadProbe {
        threads: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler<Ping> for ThreadProbe {
        async fn handle_event(&self, _event: &Event<Ping>) -> HandlerResult {
            let name = std::thread::current().name().unwrap_or_default().to_string();
            self.threads.lock().unwrap().push(name);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_config_file_drives_dedicated_scheduler() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(DEDICATED_TOML.as_bytes()).unwrap();
        let config = ConfigLoader::load_from_path(file.path()).unwrap();

        let threads = Arc::new(Mutex::new(Vec::new()));
        let mut builder = NotifierBuilder::new();
        builder
            .configure(Options::from_config(&config.dispatch).unwrap())
            .unwrap()
            .register_handler_instance::<Ping, _>(ThreadProbe {
                threads: Arc::clone(&threads),
            })
            .unwrap();
        let notifier = builder.build(Arc::new(EmptyResolver)).unwrap();

        assert!(notifier.is_async());
        assert!(!notifier.is_scheduler_started());
        for x in 0..4 {
            notifier.notify(ping(x)).await.unwrap();
        }
        assert!(notifier.is_scheduler_started());

        for _ in 0..200 {
            if notifier.metrics().snapshot().finished_units() == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let threads = threads.lock().unwrap();
        assert_eq!(threads.len(), 4);
        assert!(threads.iter().all(|name| name == "herald-it"), "{threads:?}");
    }

    #[tokio::test]
    async fn test_config_with_sink_aggregates_outcomes() {
        let config = ConfigLoader::load_from_str(
            "[dispatch]\nmode = \"async\"\n",
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let aggregator = Arc::new(Mutex::new(OutcomeAggregator::new()));
        let consumed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&consumed);
        let options = AsyncOptions::builder_from_config(&config.dispatch)
            .unwrap()
            .error_consumer(move |failures| {
                counter.fetch_add(failures.len(), Ordering::SeqCst);
                Err("rejected".into())
            })
            .shared_task_sink(aggregating_task_sink(Arc::clone(&aggregator)))
            .build()
            .unwrap();

        let mut builder = NotifierBuilder::new();
        builder
            .configure(Options::asynchronous(options))
            .unwrap()
            .register_handler_instance::<Ping, _>(EvenOnly {
                calls: Arc::new(AtomicUsize::new(0)),
            })
            .unwrap()
            .register_handler_instance::<Ping, _>(Failing)
            .unwrap();
        let notifier = builder.build(Arc::new(EmptyResolver)).unwrap();

        for x in 0..6 {
            notifier.notify(ping(x)).await.unwrap();
        }

        for _ in 0..200 {
            if aggregator.lock().unwrap().total_units == 6 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let summary = aggregator.lock().unwrap().summary();
        assert_eq!(summary.total_units, 6);
        assert_eq!(summary.faulted, 6);
        assert_eq!(summary.failures_by_handler.values().sum::<u64>(), 6);
        assert_eq!(consumed.load(Ordering::SeqCst), 6);
        assert_eq!(notifier.metrics().snapshot().consumer_failures, 6);
    }
}
