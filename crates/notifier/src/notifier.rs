//! Notifier - the immutable dispatch front end produced by `NotifierBuilder`

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, instrument, warn};

use contracts::{Event, HandlerFailures, NotifyError};

use crate::binding::{HandlerBinding, ResolvedHandler};
use crate::dispatch::{run_handlers, run_unit};
use crate::metrics::NotifierMetrics;
use crate::options::{AsyncOptions, Options};
use crate::router::{OutcomeRouter, PendingUnit};
use crate::scheduler::Scheduler;

/// Type-erased `HandlerBinding<T>`, keyed by `TypeId::of::<T>()`
pub(crate) type ErasedBinding = Box<dyn Any + Send + Sync>;

/// Background machinery, created on the first asynchronous notification
struct AsyncRuntime {
    scheduler: Scheduler,
    router: Arc<OutcomeRouter>,
}

impl AsyncRuntime {
    /// False once the runtime the router worker lives on has shut down
    fn is_alive(&self) -> bool {
        !self.router.is_closed()
    }
}

struct Inner {
    bindings: HashMap<TypeId, ErasedBinding>,
    event_types: Vec<&'static str>,
    options: Options,
    runtime: Mutex<Option<Arc<AsyncRuntime>>>,
    metrics: Arc<NotifierMetrics>,
}

/// Dispatches events to the handlers registered for their payload type
///
/// Cheap to clone; clones share bindings, scheduler and counters.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl Notifier {
    pub(crate) fn new(
        bindings: HashMap<TypeId, ErasedBinding>,
        event_types: Vec<&'static str>,
        options: Options,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                bindings,
                event_types,
                options,
                runtime: Mutex::new(None),
                metrics: Arc::new(NotifierMetrics::new()),
            }),
        }
    }

    /// Raise an event
    ///
    /// Synchronous mode returns once every matching handler has finished and
    /// reports their failures. Asynchronous mode schedules one background unit
    /// and returns `Ok(())` without waiting for it.
    ///
    /// # Errors
    /// - `HandlerNotFound` when nothing is registered for `T`
    /// - `InvalidArgument` for a malformed event
    /// - `Resolution` when a lazily registered handler cannot be resolved
    /// - `Scheduler` when the background scheduler cannot be created
    /// - `HandlersFailed` in synchronous mode when any handler fails
    #[instrument(
        name = "notifier_notify",
        skip_all,
        fields(event = %event.name(), event_type = type_name::<T>())
    )]
    pub async fn notify<T: Send + Sync + 'static>(&self, event: Event<T>) -> Result<(), NotifyError> {
        self.inner.metrics.inc_notifications();

        let binding = self
            .binding::<T>()
            .ok_or_else(NotifyError::handler_not_found::<T>)?;

        if !event.is_well_formed() {
            return Err(NotifyError::InvalidArgument {
                message: "event name cannot be empty or whitespace".to_string(),
            });
        }

        let handlers = binding
            .matching(&event)
            .map_err(|source| NotifyError::Resolution {
                event_type: type_name::<T>(),
                source,
            })?;

        if handlers.is_empty() {
            debug!("No handler accepted the event");
            return Ok(());
        }

        let event = Arc::new(event);
        match self.inner.options.async_behavior() {
            None => self.dispatch_now(handlers, event).await,
            Some(options) => self.schedule(handlers, event, Arc::clone(options)),
        }
    }

    async fn dispatch_now<T: Send + Sync + 'static>(
        &self,
        handlers: Vec<ResolvedHandler<T>>,
        event: Arc<Event<T>>,
    ) -> Result<(), NotifyError> {
        let failures = run_handlers(&handlers, &event, &self.inner.metrics).await;
        match HandlerFailures::from_vec(failures) {
            None => Ok(()),
            Some(failures) => Err(NotifyError::HandlersFailed(failures)),
        }
    }

    fn schedule<T: Send + Sync + 'static>(
        &self,
        handlers: Vec<ResolvedHandler<T>>,
        event: Arc<Event<T>>,
        options: Arc<AsyncOptions>,
    ) -> Result<(), NotifyError> {
        let runtime = self.runtime(&options)?;
        let pending =
            PendingUnit::new(Arc::clone(&runtime.router), event.name(), type_name::<T>());
        let metrics = Arc::clone(&self.inner.metrics);
        let hints = options.task_hints();

        metrics.inc_scheduled_units();
        runtime.scheduler.spawn(hints, async move {
            let outcome = run_unit(handlers, event, options, metrics).await;
            pending.deliver(outcome);
        });
        Ok(())
    }

    /// Scheduler and router, created on first use
    ///
    /// Recreated when the runtime they were spawned on has shut down, which
    /// happens to an ambient scheduler that outlives its runtime.
    fn runtime(&self, options: &AsyncOptions) -> Result<Arc<AsyncRuntime>, NotifyError> {
        let mut slot = self.runtime_slot();
        if let Some(runtime) = slot.as_ref() {
            if runtime.is_alive() {
                return Ok(Arc::clone(runtime));
            }
            warn!("Background runtime shut down, recreating the scheduler");
        }

        let scheduler = (options.scheduler_factory())().map_err(|e| NotifyError::Scheduler {
            message: e.to_string(),
        })?;
        let router = OutcomeRouter::spawn(
            scheduler.handle(),
            options.task_sink().cloned(),
            Arc::clone(&self.inner.metrics),
        );
        info!(
            dedicated = scheduler.is_dedicated(),
            "Background scheduler created"
        );

        let runtime = Arc::new(AsyncRuntime {
            scheduler,
            router: Arc::new(router),
        });
        *slot = Some(Arc::clone(&runtime));
        Ok(runtime)
    }

    fn runtime_slot(&self) -> MutexGuard<'_, Option<Arc<AsyncRuntime>>> {
        self.inner
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn binding<T: Send + Sync + 'static>(&self) -> Option<&HandlerBinding<T>> {
        self.inner
            .bindings
            .get(&TypeId::of::<T>())
            .and_then(|erased| erased.downcast_ref::<HandlerBinding<T>>())
    }

    /// Payload types with at least one handler, in registration order
    pub fn registered_events(&self) -> &[&'static str] {
        &self.inner.event_types
    }

    pub fn is_registered<T: Send + Sync + 'static>(&self) -> bool {
        self.binding::<T>().is_some()
    }

    /// Number of handlers bound to `T`
    pub fn handler_count<T: Send + Sync + 'static>(&self) -> usize {
        self.binding::<T>().map_or(0, HandlerBinding::len)
    }

    /// Handler type names bound to `T`, in dispatch order
    pub fn handler_types<T: Send + Sync + 'static>(&self) -> Vec<&'static str> {
        self.binding::<T>()
            .map(HandlerBinding::handler_types)
            .unwrap_or_default()
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    pub fn is_async(&self) -> bool {
        self.inner.options.is_async_enabled()
    }

    /// Whether the background scheduler has been created
    pub fn is_scheduler_started(&self) -> bool {
        self.runtime_slot().is_some()
    }

    pub fn metrics(&self) -> &Arc<NotifierMetrics> {
        &self.inner.metrics
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("event_types", &self.inner.event_types)
            .field("options", &self.inner.options)
            .field("scheduler_started", &self.is_scheduler_started())
            .finish()
    }
}
