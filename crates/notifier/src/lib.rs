//! # Notifier
//!
//! In-process domain-event dispatch.
//!
//! Responsibilities:
//! - Collect handler registrations per payload type (`NotifierBuilder`)
//! - Resolve lazily registered handlers once, on first use
//! - Run every matching handler and aggregate their failures
//! - In asynchronous mode, run one background unit per event and route its
//!   outcome to error consumers, the task sink, or the unobserved channel

mod binding;
pub mod builder;
mod dispatch;
pub mod handler_fn;
pub mod metrics;
pub mod notifier;
pub mod options;
pub mod resolver;
mod router;
pub mod scheduler;

pub use builder::NotifierBuilder;
pub use contracts::{
    async_trait, BoxError, ContractError, Event, EventHandler, HandlerFailure, HandlerFailures,
    HandlerResolver, HandlerResult, NotifyError, TaskOutcome, TaskStatus,
};
pub use handler_fn::FnHandler;
pub use metrics::{MetricsSnapshot, NotifierMetrics};
pub use notifier::Notifier;
pub use options::{AsyncOptions, AsyncOptionsBuilder, ErrorConsumer, Options, SchedulerFactory, TaskSink};
pub use resolver::{EmptyResolver, FactoryResolver};
pub use router::UNOBSERVED_TARGET;
pub use scheduler::{Scheduler, SchedulerSpec, TaskHints, DEFAULT_THREAD_NAME};
pub use tokio_util::sync::CancellationToken;
