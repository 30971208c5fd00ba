//! Demo orchestrator - builds a notifier from configuration and drives events through it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};

use contracts::{DispatchConfig, DispatchMode, HandlerFailure};
use notifier::{
    AsyncOptions, CancellationToken, Event, FactoryResolver, Notifier, NotifierBuilder, Options,
};
use observability::{aggregating_task_sink, record_notify, record_notify_latency_ms, OutcomeAggregator};

use super::handlers::{
    order_amount_cents, AuditTrail, InventoryReserver, LargeOrderReview, OrderPlaced,
    PaymentCaptured,
};
use super::stats::{DemoReport, HandlerTallies};
use crate::error::CliError;

const ORDER_PLACED: &str = "order.placed";
const PAYMENT_CAPTURED: &str = "payment.captured";
const REVIEW_THRESHOLD_CENTS: u64 = 40_000;
const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Demo configuration
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Dispatch section of the loaded configuration file
    pub dispatch: DispatchConfig,

    /// Number of orders to raise
    pub events: u64,

    /// Every K-th order fails (None = never)
    pub fail_every: Option<u64>,

    /// Simulated work inside the inventory handler
    pub handler_delay: Duration,

    /// Error consumer returns an error instead of swallowing failures
    pub failing_consumer: bool,

    /// Upper bound on the wait for background units
    pub settle_timeout: Duration,
}

/// Handlers whose counters end up in the report
struct DemoHandlers {
    inventory: Arc<InventoryReserver>,
    review: Arc<LargeOrderReview>,
    audit: Arc<AuditTrail>,
    receipts: Arc<AtomicU64>,
    consumed: Arc<AtomicU64>,
}

impl DemoHandlers {
    fn new(config: &DemoConfig) -> Self {
        Self {
            inventory: Arc::new(InventoryReserver::new(config.fail_every, config.handler_delay)),
            review: Arc::new(LargeOrderReview::new(REVIEW_THRESHOLD_CENTS)),
            audit: Arc::new(AuditTrail::default()),
            receipts: Arc::new(AtomicU64::new(0)),
            consumed: Arc::new(AtomicU64::new(0)),
        }
    }

    fn tallies(&self) -> HandlerTallies {
        HandlerTallies {
            reserved: self.inventory.reserved(),
            flagged_for_review: self.review.flagged(),
            audit_entries: self.audit.entries(),
            receipts_sent: self.receipts.load(Ordering::Relaxed),
            failures_consumed: self.consumed.load(Ordering::Relaxed),
        }
    }
}

/// Demo runner
pub struct Demo {
    config: DemoConfig,
    cancellation: CancellationToken,
}

impl Demo {
    pub fn new(config: DemoConfig, cancellation: CancellationToken) -> Self {
        Self {
            config,
            cancellation,
        }
    }

    /// Run the demo to completion
    pub async fn run(self) -> Result<DemoReport> {
        let start_time = Instant::now();
        let handlers = DemoHandlers::new(&self.config);
        let aggregator = Arc::new(Mutex::new(OutcomeAggregator::new()));

        let options = self.build_options(&handlers, &aggregator)?;
        let notifier = build_notifier(options, &handlers)?;

        info!(
            events = self.config.events,
            is_async = notifier.is_async(),
            handlers = notifier.handler_count::<OrderPlaced>(),
            "Raising demo events"
        );

        let mut events_raised = 0;
        let mut notify_errors = 0;
        for order_id in 1..=self.config.events {
            if self.cancellation.is_cancelled() {
                warn!(raised = events_raised, "Demo interrupted");
                break;
            }

            let amount_cents = order_amount_cents(order_id);
            let order = Event::new(
                ORDER_PLACED,
                OrderPlaced {
                    order_id,
                    amount_cents,
                },
            )?;

            let started = Instant::now();
            let result = notifier.notify(order).await;
            let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;

            record_notify(ORDER_PLACED, &result);
            record_notify_latency_ms(ORDER_PLACED, latency_ms);
            lock(&aggregator).record_latency_ms(latency_ms);
            events_raised += 1;

            match result {
                Ok(()) => {
                    let payment = Event::new(
                        PAYMENT_CAPTURED,
                        PaymentCaptured {
                            order_id,
                            amount_cents,
                        },
                    )?;
                    let result = notifier.notify(payment).await;
                    record_notify(PAYMENT_CAPTURED, &result);
                    events_raised += 1;
                    if let Err(e) = result {
                        notify_errors += 1;
                        warn!(order_id, error = %e, "Payment notification failed");
                    }
                }
                Err(e) => {
                    notify_errors += 1;
                    debug!(order_id, error = %e, "Order notification failed");
                }
            }
        }

        if notifier.is_async() {
            self.wait_for_background_units(&notifier, &aggregator).await?;
        }

        let snapshot = notifier.metrics().snapshot();
        observability::record_snapshot(&snapshot);
        let outcomes = lock(&aggregator).summary();

        Ok(DemoReport {
            mode: if notifier.is_async() { "async" } else { "sync" },
            events_raised,
            notify_errors,
            duration: start_time.elapsed(),
            snapshot,
            outcomes,
            handlers: handlers.tallies(),
            cancelled: self.cancellation.is_cancelled(),
        })
    }

    fn build_options(
        &self,
        handlers: &DemoHandlers,
        aggregator: &Arc<Mutex<OutcomeAggregator>>,
    ) -> Result<Options, CliError> {
        if self.config.dispatch.mode == DispatchMode::Sync {
            return Ok(Options::synchronous());
        }

        let consumed = Arc::clone(&handlers.consumed);
        let failing = self.config.failing_consumer;
        let options = AsyncOptions::builder_from_config(&self.config.dispatch)?
            .cancellation(self.cancellation.clone())
            .error_consumer(move |failures: &[HandlerFailure]| {
                consumed.fetch_add(failures.len() as u64, Ordering::Relaxed);
                for failure in failures {
                    debug!(
                        handler = failure.handler_type(),
                        event = failure.event_name(),
                        order_id = failure.event::<OrderPlaced>().map(|e| e.data().order_id),
                        "Failure consumed"
                    );
                }
                if failing {
                    return Err("failure queue unavailable".into());
                }
                Ok(())
            })
            .shared_task_sink(aggregating_task_sink(Arc::clone(aggregator)))
            .build()?;

        Ok(Options::asynchronous(options))
    }

    /// Wait until the task sink has seen every scheduled unit
    async fn wait_for_background_units(
        &self,
        notifier: &Notifier,
        aggregator: &Arc<Mutex<OutcomeAggregator>>,
    ) -> Result<(), CliError> {
        let deadline = Instant::now() + self.config.settle_timeout;
        loop {
            let scheduled = notifier.metrics().scheduled_units();
            let delivered = lock(aggregator).total_units;
            if delivered >= scheduled {
                debug!(units = delivered, "All background units finished");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CliError::settle_timeout(
                    scheduled - delivered,
                    self.config.settle_timeout.as_millis() as u64,
                ));
            }
            tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
        }
    }
}

/// Register the demo handlers and build the notifier
///
/// `AuditTrail` is registered by type for both payloads and resolved through
/// the factory resolver, which hands out one shared instance.
fn build_notifier(options: Options, handlers: &DemoHandlers) -> Result<Notifier, CliError> {
    let mut resolver = FactoryResolver::new();
    resolver.register_instance(Arc::clone(&handlers.audit));

    let receipts = Arc::clone(&handlers.receipts);
    let mut builder = NotifierBuilder::new();
    builder
        .configure(options)?
        .register_handler_arc::<OrderPlaced, _>(Arc::clone(&handlers.inventory))?
        .register_handler_arc::<OrderPlaced, _>(Arc::clone(&handlers.review))?
        .register_handler_type::<OrderPlaced, AuditTrail>()?
        .register_handler_fn::<PaymentCaptured, _>(move |_: &Event<PaymentCaptured>| {
            receipts.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })?
        .register_handler_type::<PaymentCaptured, AuditTrail>()?;

    Ok(builder.build(Arc::new(resolver))?)
}

fn lock(aggregator: &Mutex<OutcomeAggregator>) -> std::sync::MutexGuard<'_, OutcomeAggregator> {
    aggregator
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SchedulerConfig, SchedulerKind, TaskConfig};

    fn config(mode: DispatchMode) -> DemoConfig {
        DemoConfig {
            dispatch: DispatchConfig {
                mode,
                ..DispatchConfig::default()
            },
            events: 10,
            fail_every: Some(5),
            handler_delay: Duration::ZERO,
            failing_consumer: false,
            settle_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_sync_demo_reports_failed_orders() {
        let report = Demo::new(config(DispatchMode::Sync), CancellationToken::new())
            .run()
            .await
            .unwrap();

        assert_eq!(report.mode, "sync");
        // Orders 5 and 10 fail, the other eight also raise a payment
        assert_eq!(report.notify_errors, 2);
        assert_eq!(report.events_raised, 18);
        assert_eq!(report.handlers.reserved, 8);
        assert_eq!(report.handlers.receipts_sent, 8);
        assert_eq!(report.handlers.audit_entries, 18);
        assert_eq!(report.snapshot.handler_failures, 2);
        assert_eq!(report.snapshot.scheduled_units, 0);
    }

    #[tokio::test]
    async fn test_async_demo_consumes_failures() {
        let report = Demo::new(config(DispatchMode::Async), CancellationToken::new())
            .run()
            .await
            .unwrap();

        assert_eq!(report.mode, "async");
        assert_eq!(report.notify_errors, 0);
        assert_eq!(report.events_raised, 20);
        assert_eq!(report.snapshot.scheduled_units, 20);
        assert_eq!(report.outcomes.total_units, 20);
        assert_eq!(report.outcomes.completed, 20);
        assert_eq!(report.handlers.failures_consumed, 2);
        assert_eq!(report.snapshot.unobserved_failures, 0);
    }

    #[tokio::test]
    async fn test_async_demo_failing_consumer_faults_units() {
        let mut config = config(DispatchMode::Async);
        config.failing_consumer = true;
        config.dispatch.scheduler = SchedulerConfig {
            kind: SchedulerKind::Dedicated,
            worker_threads: Some(2),
            thread_name: None,
        };
        config.dispatch.task = TaskConfig { long_running: true };

        let report = Demo::new(config, CancellationToken::new())
            .run()
            .await
            .unwrap();

        assert_eq!(report.outcomes.faulted, 2);
        assert_eq!(report.snapshot.consumer_failures, 2);
        assert_eq!(
            report.outcomes.failures_by_handler.values().sum::<u64>(),
            2
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start_raises_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let report = Demo::new(config(DispatchMode::Async), token)
            .run()
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.events_raised, 0);
        assert_eq!(report.snapshot.notifications, 0);
    }
}
