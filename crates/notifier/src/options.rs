//! Notifier options
//!
//! `Options` selects synchronous or asynchronous dispatch. Asynchronous
//! dispatch carries an `AsyncOptions` describing where background units run
//! and where their failures go.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use contracts::{
    BoxError, ContractError, DispatchConfig, DispatchMode, HandlerFailure, SchedulerConfig,
    SchedulerKind, TaskOutcome,
};

use crate::scheduler::{Scheduler, SchedulerSpec, TaskHints, DEFAULT_THREAD_NAME};

/// Callback receiving every handler failure of one background unit
pub type ErrorConsumer = Arc<dyn Fn(&[HandlerFailure]) -> Result<(), BoxError> + Send + Sync>;

/// Callback receiving the final outcome of every background unit
pub type TaskSink = Arc<dyn Fn(TaskOutcome) + Send + Sync>;

/// Produces the scheduler; called once per notifier
pub type SchedulerFactory = Arc<dyn Fn() -> Result<Scheduler, ContractError> + Send + Sync>;

/// Notifier options
///
/// The default is synchronous dispatch.
#[derive(Clone, Default)]
pub struct Options {
    async_behavior: Option<Arc<AsyncOptions>>,
}

impl Options {
    /// `notify` awaits every matched handler
    pub fn synchronous() -> Self {
        Self::default()
    }

    /// `notify` schedules a background unit and returns immediately
    pub fn asynchronous(options: AsyncOptions) -> Self {
        Self {
            async_behavior: Some(Arc::new(options)),
        }
    }

    pub fn is_async_enabled(&self) -> bool {
        self.async_behavior.is_some()
    }

    pub fn async_behavior(&self) -> Option<&Arc<AsyncOptions>> {
        self.async_behavior.as_ref()
    }

    /// Build options from file configuration
    ///
    /// Error consumers and the task sink are not part of the file format; use
    /// `AsyncOptions::builder_from_config` to attach them.
    pub fn from_config(config: &DispatchConfig) -> Result<Self, ContractError> {
        match config.mode {
            DispatchMode::Sync => Ok(Self::synchronous()),
            DispatchMode::Async => {
                AsyncOptions::builder_from_config(config)?
                    .build()
                    .map(Self::asynchronous)
            }
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("async_behavior", &self.async_behavior)
            .finish()
    }
}

/// Asynchronous dispatch options
#[derive(Clone)]
pub struct AsyncOptions {
    scheduler_factory: SchedulerFactory,
    cancellation: Option<CancellationToken>,
    task_hints: TaskHints,
    error_consumers: Vec<ErrorConsumer>,
    task_sink: Option<TaskSink>,
}

impl AsyncOptions {
    pub fn builder() -> AsyncOptionsBuilder {
        AsyncOptionsBuilder::default()
    }

    /// Builder pre-populated with the scheduler and task hints of a file configuration
    pub fn builder_from_config(config: &DispatchConfig) -> Result<AsyncOptionsBuilder, ContractError> {
        let spec = scheduler_spec_from_config(&config.scheduler)?;
        Ok(Self::builder()
            .scheduler(spec)
            .task_hints(TaskHints {
                long_running: config.task.long_running,
            }))
    }

    pub fn scheduler_factory(&self) -> &SchedulerFactory {
        &self.scheduler_factory
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    pub fn task_hints(&self) -> TaskHints {
        self.task_hints
    }

    pub fn error_consumers(&self) -> &[ErrorConsumer] {
        &self.error_consumers
    }

    pub fn task_sink(&self) -> Option<&TaskSink> {
        self.task_sink.as_ref()
    }
}

impl Default for AsyncOptions {
    /// Ambient scheduler, no cancellation, no consumers, no sink
    fn default() -> Self {
        Self {
            scheduler_factory: Arc::new(Scheduler::ambient),
            cancellation: None,
            task_hints: TaskHints::default(),
            error_consumers: Vec::new(),
            task_sink: None,
        }
    }
}

impl fmt::Debug for AsyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOptions")
            .field("cancellation", &self.cancellation)
            .field("task_hints", &self.task_hints)
            .field("error_consumers", &self.error_consumers.len())
            .field("task_sink", &self.task_sink.is_some())
            .finish()
    }
}

enum SchedulerSource {
    Spec(SchedulerSpec),
    Factory(SchedulerFactory),
}

/// Builder for `AsyncOptions`
pub struct AsyncOptionsBuilder {
    scheduler: SchedulerSource,
    cancellation: Option<CancellationToken>,
    task_hints: TaskHints,
    error_consumers: Vec<ErrorConsumer>,
    task_sink: Option<TaskSink>,
}

impl Default for AsyncOptionsBuilder {
    fn default() -> Self {
        Self {
            scheduler: SchedulerSource::Spec(SchedulerSpec::Ambient),
            cancellation: None,
            task_hints: TaskHints::default(),
            error_consumers: Vec::new(),
            task_sink: None,
        }
    }
}

impl AsyncOptionsBuilder {
    /// Select a scheduler by description
    pub fn scheduler(mut self, spec: SchedulerSpec) -> Self {
        self.scheduler = SchedulerSource::Spec(spec);
        self
    }

    /// Supply a custom scheduler factory
    pub fn scheduler_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Scheduler, ContractError> + Send + Sync + 'static,
    {
        self.scheduler = SchedulerSource::Factory(Arc::new(factory));
        self
    }

    /// Token attached to every background unit
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn task_hints(mut self, hints: TaskHints) -> Self {
        self.task_hints = hints;
        self
    }

    /// Append an error consumer; consumers run in registration order
    pub fn error_consumer<F>(mut self, consumer: F) -> Self
    where
        F: Fn(&[HandlerFailure]) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.error_consumers.push(Arc::new(consumer));
        self
    }

    /// Set the task sink
    pub fn task_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(TaskOutcome) + Send + Sync + 'static,
    {
        self.task_sink = Some(Arc::new(sink));
        self
    }

    /// Set an already shared task sink
    pub fn shared_task_sink(mut self, sink: TaskSink) -> Self {
        self.task_sink = Some(sink);
        self
    }

    /// Validate and build
    ///
    /// # Errors
    /// Returns `ContractError::ConfigValidation` if the scheduler spec is invalid.
    pub fn build(self) -> Result<AsyncOptions, ContractError> {
        let scheduler_factory: SchedulerFactory = match self.scheduler {
            SchedulerSource::Spec(spec) => {
                spec.validate()?;
                Arc::new(move || spec.create())
            }
            SchedulerSource::Factory(factory) => factory,
        };

        Ok(AsyncOptions {
            scheduler_factory,
            cancellation: self.cancellation,
            task_hints: self.task_hints,
            error_consumers: self.error_consumers,
            task_sink: self.task_sink,
        })
    }
}

fn scheduler_spec_from_config(config: &SchedulerConfig) -> Result<SchedulerSpec, ContractError> {
    match config.kind {
        SchedulerKind::Ambient => {
            if config.worker_threads.is_some() {
                return Err(ContractError::config_validation(
                    "dispatch.scheduler.worker_threads",
                    "worker_threads only applies to a dedicated scheduler",
                ));
            }
            Ok(SchedulerSpec::Ambient)
        }
        SchedulerKind::Dedicated => {
            let spec = SchedulerSpec::Dedicated {
                worker_threads: config.worker_threads.unwrap_or(1),
                thread_name: config
                    .thread_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_THREAD_NAME.to_string()),
            };
            spec.validate()?;
            Ok(spec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TaskConfig;

    #[test]
    fn test_default_is_synchronous() {
        let options = Options::default();
        assert!(!options.is_async_enabled());
        assert!(options.async_behavior().is_none());
    }

    #[test]
    fn test_builder_collects_consumers_in_order() {
        let options = AsyncOptions::builder()
            .error_consumer(|_| Ok(()))
            .error_consumer(|_| Err("second".into()))
            .task_sink(|_| {})
            .cancellation(CancellationToken::new())
            .task_hints(TaskHints::long_running())
            .build()
            .unwrap();

        assert_eq!(options.error_consumers().len(), 2);
        assert!(options.error_consumers()[1](&[]).is_err());
        assert!(options.task_sink().is_some());
        assert!(options.cancellation().is_some());
        assert!(options.task_hints().long_running);
    }

    #[test]
    fn test_invalid_scheduler_rejected() {
        let result = AsyncOptions::builder()
            .scheduler(SchedulerSpec::dedicated(0))
            .build();
        assert!(matches!(result, Err(ContractError::ConfigValidation { .. })));
    }

    #[test]
    fn test_from_config_sync_mode() {
        let options = Options::from_config(&DispatchConfig::default()).unwrap();
        assert!(!options.is_async_enabled());
    }

    #[test]
    fn test_from_config_async_dedicated() {
        let config = DispatchConfig {
            mode: DispatchMode::Async,
            scheduler: SchedulerConfig {
                kind: SchedulerKind::Dedicated,
                worker_threads: Some(2),
                thread_name: None,
            },
            task: TaskConfig { long_running: true },
        };
        let options = Options::from_config(&config).unwrap();
        let behavior = options.async_behavior().unwrap();
        assert!(behavior.task_hints().long_running);
        assert!(behavior.error_consumers().is_empty());
    }

    #[test]
    fn test_from_config_ambient_with_threads_rejected() {
        let config = DispatchConfig {
            mode: DispatchMode::Async,
            scheduler: SchedulerConfig {
                kind: SchedulerKind::Ambient,
                worker_threads: Some(4),
                thread_name: None,
            },
            task: TaskConfig::default(),
        };
        let err = Options::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("worker_threads"));
    }
}
