//! Failure model - captured handler errors and background outcomes
//!
//! Synchronous dispatch returns `HandlerFailures` directly; asynchronous
//! dispatch reports the same information through `TaskOutcome`.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::{BoxError, Event};

/// One handler's failure, with the handler and event it happened on
pub struct HandlerFailure {
    handler_type: &'static str,
    event_name: String,
    event_type: &'static str,
    event: Arc<dyn Any + Send + Sync>,
    cause: BoxError,
}

impl HandlerFailure {
    /// Wrap a handler's error together with its context
    pub fn new<T: Send + Sync + 'static>(
        handler_type: &'static str,
        event: Arc<Event<T>>,
        cause: BoxError,
    ) -> Self {
        Self {
            handler_type,
            event_name: event.name().to_string(),
            event_type: std::any::type_name::<T>(),
            event,
            cause,
        }
    }

    /// Type name of the failing handler
    pub fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    /// Name of the event being handled
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Payload type name of the event being handled
    pub fn event_type(&self) -> &'static str {
        self.event_type
    }

    /// The event being handled, if its payload type is `T`
    pub fn event<T: 'static>(&self) -> Option<&Event<T>> {
        self.event.downcast_ref::<Event<T>>()
    }

    /// The underlying error
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.cause.as_ref()
    }
}

impl fmt::Debug for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFailure")
            .field("handler_type", &self.handler_type)
            .field("event_name", &self.event_name)
            .field("event_type", &self.event_type)
            .field("cause", &self.cause)
            .finish()
    }
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler '{}' failed on event '{}': {}",
            self.handler_type, self.event_name, self.cause
        )
    }
}

impl StdError for HandlerFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Aggregate of every handler failure from one dispatch. Never empty.
#[derive(Debug)]
pub struct HandlerFailures {
    failures: Vec<HandlerFailure>,
}

impl HandlerFailures {
    /// Aggregate failures, or `None` if there are none
    pub fn from_vec(failures: Vec<HandlerFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures })
        }
    }

    /// Number of failed handlers
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HandlerFailure> {
        self.failures.iter()
    }

    pub fn as_slice(&self) -> &[HandlerFailure] {
        &self.failures
    }

    pub fn into_vec(self) -> Vec<HandlerFailure> {
        self.failures
    }
}

impl<'a> IntoIterator for &'a HandlerFailures {
    type Item = &'a HandlerFailure;
    type IntoIter = std::slice::Iter<'a, HandlerFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.iter()
    }
}

impl fmt::Display for HandlerFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} handler(s) failed", self.failures.len())?;
        if let Some(first) = self.failures.first() {
            write!(f, "; first: {first}")?;
        }
        Ok(())
    }
}

impl StdError for HandlerFailures {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.failures.first().map(|f| f as &(dyn StdError + 'static))
    }
}

/// Error raised (or panic captured) by one error consumer
#[derive(Debug, Error)]
#[error("error consumer #{index} failed: {cause}")]
pub struct ConsumerError {
    /// Position of the consumer in registration order
    pub index: usize,
    #[source]
    pub cause: BoxError,
}

/// Consumer failures together with the handler failures they were consuming
///
/// `len()` counts every consumer error plus one entry for the original
/// handler aggregate.
#[derive(Debug)]
pub struct ConsumerFailures {
    consumer_errors: Vec<ConsumerError>,
    handler_failures: HandlerFailures,
}

impl ConsumerFailures {
    pub fn new(consumer_errors: Vec<ConsumerError>, handler_failures: HandlerFailures) -> Self {
        Self {
            consumer_errors,
            handler_failures,
        }
    }

    pub fn consumer_errors(&self) -> &[ConsumerError] {
        &self.consumer_errors
    }

    pub fn handler_failures(&self) -> &HandlerFailures {
        &self.handler_failures
    }

    /// Total aggregated entries: consumer errors + the handler aggregate
    pub fn len(&self) -> usize {
        self.consumer_errors.len() + 1
    }

    /// Always false: the handler aggregate is always present
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every aggregated entry, consumer errors first
    pub fn errors(&self) -> impl Iterator<Item = &(dyn StdError + 'static)> {
        self.consumer_errors
            .iter()
            .map(|e| e as &(dyn StdError + 'static))
            .chain(std::iter::once(
                &self.handler_failures as &(dyn StdError + 'static),
            ))
    }
}

impl fmt::Display for ConsumerFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error consumer(s) failed while consuming {} handler failure(s)",
            self.consumer_errors.len(),
            self.handler_failures.len()
        )
    }
}

impl StdError for ConsumerFailures {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.handler_failures)
    }
}

/// Why a background dispatch unit faulted
#[derive(Debug, Error)]
pub enum DispatchFailure {
    /// Handlers failed and no error consumer was configured
    #[error(transparent)]
    Handlers(#[from] HandlerFailures),

    /// Handlers failed and at least one error consumer failed too
    #[error(transparent)]
    Consumers(#[from] ConsumerFailures),
}

impl DispatchFailure {
    /// The handler failures behind this fault
    pub fn handler_failures(&self) -> &HandlerFailures {
        match self {
            Self::Handlers(failures) => failures,
            Self::Consumers(failures) => failures.handler_failures(),
        }
    }
}

/// Completion state of a background dispatch unit
#[derive(Debug)]
pub enum TaskStatus {
    /// Every handler succeeded, or every failure was consumed
    Completed,
    /// Failures remained unconsumed
    Faulted(DispatchFailure),
    /// The cancellation token fired before the unit started
    Cancelled,
}

/// Final outcome of one background dispatch unit, delivered to the task sink
#[derive(Debug)]
pub struct TaskOutcome {
    pub event_name: String,
    pub event_type: &'static str,
    pub status: TaskStatus,
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, TaskStatus::Completed)
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.status, TaskStatus::Faulted(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, TaskStatus::Cancelled)
    }

    pub fn failure(&self) -> Option<&DispatchFailure> {
        match &self.status {
            TaskStatus::Faulted(failure) => Some(failure),
            _ => None,
        }
    }

    /// Short label for logs and metrics
    pub fn status_label(&self) -> &'static str {
        match self.status {
            TaskStatus::Completed => "completed",
            TaskStatus::Faulted(_) => "faulted",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}
