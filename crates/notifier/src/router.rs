//! OutcomeRouter - delivers background outcomes from a single worker task
//!
//! Background units push their `TaskOutcome` into an unbounded channel; the
//! router worker hands each one to the task sink, or reports unobserved faults.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, instrument, trace, warn};

use contracts::{TaskOutcome, TaskStatus};

use crate::metrics::NotifierMetrics;
use crate::options::TaskSink;

/// Target of the events emitted for faults nobody observes
pub const UNOBSERVED_TARGET: &str = "herald::unobserved";

/// Handle to a running outcome router
pub(crate) struct OutcomeRouter {
    tx: mpsc::UnboundedSender<TaskOutcome>,
    sink: Option<TaskSink>,
    metrics: Arc<NotifierMetrics>,
}

impl OutcomeRouter {
    /// Create the router and spawn its worker on `handle`
    pub(crate) fn spawn(
        handle: &Handle,
        sink: Option<TaskSink>,
        metrics: Arc<NotifierMetrics>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let worker_sink = sink.clone();
        let worker_metrics = Arc::clone(&metrics);
        handle.spawn(async move {
            router_worker(rx, worker_sink, worker_metrics).await;
        });

        Self { tx, sink, metrics }
    }

    /// Queue an outcome for delivery
    ///
    /// Routes inline if the worker is gone (its runtime shut down).
    pub(crate) fn deliver(&self, outcome: TaskOutcome) {
        if let Err(mpsc::error::SendError(outcome)) = self.tx.send(outcome) {
            debug!("Outcome router closed, routing inline");
            route_outcome(outcome, self.sink.as_ref(), &self.metrics);
        }
    }

    /// Whether the worker is gone, which happens when its runtime shut down
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Delivery obligation of one scheduled unit
///
/// Dropped without `deliver` (runtime shut down before or while the unit ran),
/// it reports the unit as cancelled.
pub(crate) struct PendingUnit {
    router: Arc<OutcomeRouter>,
    event_name: String,
    event_type: &'static str,
    delivered: bool,
}

impl PendingUnit {
    pub(crate) fn new(router: Arc<OutcomeRouter>, event_name: &str, event_type: &'static str) -> Self {
        Self {
            router,
            event_name: event_name.to_string(),
            event_type,
            delivered: false,
        }
    }

    pub(crate) fn deliver(mut self, outcome: TaskOutcome) {
        self.delivered = true;
        self.router.deliver(outcome);
    }
}

impl Drop for PendingUnit {
    fn drop(&mut self) {
        if self.delivered {
            return;
        }
        warn!(event = %self.event_name, "Background unit dropped before it finished");
        self.router.deliver(TaskOutcome {
            event_name: std::mem::take(&mut self.event_name),
            event_type: self.event_type,
            status: TaskStatus::Cancelled,
        });
    }
}

#[instrument(name = "notifier_outcome_router", skip_all)]
async fn router_worker(
    mut rx: mpsc::UnboundedReceiver<TaskOutcome>,
    sink: Option<TaskSink>,
    metrics: Arc<NotifierMetrics>,
) {
    debug!("Outcome router started");

    while let Some(outcome) = rx.recv().await {
        route_outcome(outcome, sink.as_ref(), &metrics);
    }

    debug!("Outcome router stopped");
}

fn route_outcome(outcome: TaskOutcome, sink: Option<&TaskSink>, metrics: &NotifierMetrics) {
    match &outcome.status {
        TaskStatus::Completed => metrics.inc_completed_units(),
        TaskStatus::Faulted(_) => metrics.inc_faulted_units(),
        TaskStatus::Cancelled => metrics.inc_cancelled_units(),
    }
    trace!(
        event = %outcome.event_name,
        status = outcome.status_label(),
        "Routing outcome"
    );

    match sink {
        Some(sink) => {
            let event_name = outcome.event_name.clone();
            if panic::catch_unwind(AssertUnwindSafe(|| sink(outcome))).is_err() {
                error!(event = %event_name, "Task sink panicked");
            }
        }
        None => {
            if let TaskStatus::Faulted(failure) = &outcome.status {
                metrics.inc_unobserved_failures();
                error!(
                    target: UNOBSERVED_TARGET,
                    event = %outcome.event_name,
                    event_type = outcome.event_type,
                    error = %failure,
                    "Unobserved background dispatch failure"
                );
            }
        }
    }
}
