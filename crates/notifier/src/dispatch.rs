//! Dispatch execution - running handlers and consuming their failures
//!
//! Shared by synchronous `notify` and the background unit of asynchronous
//! `notify`. Every handler is attempted; outcomes are settled together.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tracing::{debug, instrument, warn};

use contracts::{
    BoxError, ConsumerError, ConsumerFailures, Event, HandlerFailure, HandlerFailures,
    TaskOutcome, TaskStatus,
};

use crate::binding::ResolvedHandler;
use crate::metrics::NotifierMetrics;
use crate::options::{AsyncOptions, ErrorConsumer};

/// Run every handler and collect the failures, in handler order
///
/// Handlers run concurrently within the call; a panic is captured as a failure.
pub(crate) async fn run_handlers<T: Send + Sync + 'static>(
    handlers: &[ResolvedHandler<T>],
    event: &Arc<Event<T>>,
    metrics: &NotifierMetrics,
) -> Vec<HandlerFailure> {
    metrics.add_handler_invocations(handlers.len() as u64);

    let runs = handlers.iter().map(|resolved| async move {
        let result = AssertUnwindSafe(resolved.handler.handle_event(event.as_ref()))
            .catch_unwind()
            .await;

        let cause = match result {
            Ok(Ok(())) => return None,
            Ok(Err(cause)) => cause,
            Err(payload) => panic_cause("handler", payload),
        };

        warn!(
            handler = resolved.handler_type,
            event = %event.name(),
            error = %cause,
            "Handler failed"
        );
        Some(HandlerFailure::new(
            resolved.handler_type,
            Arc::clone(event),
            cause,
        ))
    });

    let failures: Vec<HandlerFailure> = join_all(runs).await.into_iter().flatten().collect();
    metrics.add_handler_failures(failures.len() as u64);
    failures
}

/// Give every consumer the failures; collect the consumers that fail
pub(crate) fn consume_failures(
    consumers: &[ErrorConsumer],
    failures: HandlerFailures,
    metrics: &NotifierMetrics,
) -> TaskStatus {
    let errors: Vec<ConsumerError> = consumers
        .iter()
        .enumerate()
        .filter_map(|(index, consumer)| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| consumer(failures.as_slice())));
            let cause = match result {
                Ok(Ok(())) => return None,
                Ok(Err(cause)) => cause,
                Err(payload) => panic_cause("error consumer", payload),
            };
            warn!(consumer = index, error = %cause, "Error consumer failed");
            Some(ConsumerError { index, cause })
        })
        .collect();

    if errors.is_empty() {
        debug!(failures = failures.len(), "Handler failures consumed");
        TaskStatus::Completed
    } else {
        metrics.add_consumer_failures(errors.len() as u64);
        TaskStatus::Faulted(ConsumerFailures::new(errors, failures).into())
    }
}

/// Body of one background dispatch unit
#[instrument(
    name = "notifier_background_unit",
    skip_all,
    fields(event = %event.name(), handlers = handlers.len())
)]
pub(crate) async fn run_unit<T: Send + Sync + 'static>(
    handlers: Vec<ResolvedHandler<T>>,
    event: Arc<Event<T>>,
    options: Arc<AsyncOptions>,
    metrics: Arc<NotifierMetrics>,
) -> TaskOutcome {
    let event_name = event.name().to_string();
    let event_type = std::any::type_name::<T>();

    if options.cancellation().is_some_and(|token| token.is_cancelled()) {
        debug!("Cancelled before start");
        return TaskOutcome {
            event_name,
            event_type,
            status: TaskStatus::Cancelled,
        };
    }

    let failures = run_handlers(&handlers, &event, &metrics).await;

    let status = match HandlerFailures::from_vec(failures) {
        None => TaskStatus::Completed,
        Some(failures) if options.error_consumers().is_empty() => {
            TaskStatus::Faulted(failures.into())
        }
        Some(failures) => consume_failures(options.error_consumers(), failures, &metrics),
    };

    TaskOutcome {
        event_name,
        event_type,
        status,
    }
}

fn panic_cause(origin: &str, payload: Box<dyn Any + Send>) -> BoxError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("{origin} panicked: {message}").into()
}
