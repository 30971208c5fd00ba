//! NotifierBuilder - collects handler registrations and produces a `Notifier`

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use contracts::{ContractError, Event, EventHandler, HandlerResolver, HandlerResult};

use crate::binding::{HandlerBinding, HandlerRef, LazyFactory};
use crate::handler_fn::FnHandler;
use crate::notifier::{ErasedBinding, Notifier};
use crate::options::Options;

/// Builds a lazy factory for handler type `H` against the build-time resolver
type FactoryMaker<T> = fn(Arc<dyn HandlerResolver>) -> LazyFactory<T>;

struct TypeEntry<T> {
    type_id: TypeId,
    handler_type: &'static str,
    make: FactoryMaker<T>,
}

struct InstanceEntry<T> {
    handler_type: &'static str,
    handler: Arc<dyn EventHandler<T>>,
}

/// Registrations for one payload type, before build
struct Pending<T> {
    instances: Vec<InstanceEntry<T>>,
    types: Vec<TypeEntry<T>>,
}

trait PendingBinding: Send {
    fn event_type(&self) -> &'static str;
    fn handler_types(&self) -> Vec<&'static str>;
    fn materialize(&self, resolver: &Arc<dyn HandlerResolver>) -> ErasedBinding;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Send + Sync + 'static> PendingBinding for Pending<T> {
    fn event_type(&self) -> &'static str {
        type_name::<T>()
    }

    /// Instances first, then types, each in insertion order
    fn handler_types(&self) -> Vec<&'static str> {
        self.instances
            .iter()
            .map(|entry| entry.handler_type)
            .chain(self.types.iter().map(|entry| entry.handler_type))
            .collect()
    }

    fn materialize(&self, resolver: &Arc<dyn HandlerResolver>) -> ErasedBinding {
        let refs = self
            .instances
            .iter()
            .map(|entry| HandlerRef::instance(entry.handler_type, Arc::clone(&entry.handler)))
            .chain(self.types.iter().map(|entry| {
                HandlerRef::lazy(entry.handler_type, (entry.make)(Arc::clone(resolver)))
            }))
            .collect();

        Box::new(HandlerBinding::new(refs))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn lazy_factory<T, H>(resolver: Arc<dyn HandlerResolver>) -> LazyFactory<T>
where
    T: Send + Sync + 'static,
    H: EventHandler<T>,
{
    Box::new(move || {
        let handler: Arc<dyn EventHandler<T>> = resolver.resolve_as::<H>()?;
        Ok(handler)
    })
}

/// Collects handler registrations and builds a `Notifier` exactly once
///
/// Every mutating call fails with `ContractError::AlreadyBuilt` after `build`.
pub struct NotifierBuilder {
    options: Options,
    pending: HashMap<TypeId, Box<dyn PendingBinding>>,
    order: Vec<TypeId>,
    notifier: Option<Notifier>,
}

impl Default for NotifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifierBuilder {
    /// Create a builder with synchronous options
    pub fn new() -> Self {
        Self {
            options: Options::default(),
            pending: HashMap::new(),
            order: Vec::new(),
            notifier: None,
        }
    }

    /// Replace the active options
    pub fn configure(&mut self, options: Options) -> Result<&mut Self, ContractError> {
        self.ensure_not_built()?;
        debug!(is_async = options.is_async_enabled(), "Notifier options configured");
        self.options = options;
        Ok(self)
    }

    /// Register handler type `H` for payload `T`
    ///
    /// `H` is resolved through the build-time resolver when it is first needed.
    ///
    /// # Errors
    /// `DuplicateRegistration` if the `(T, H)` pair is already registered.
    pub fn register_handler_type<T, H>(&mut self) -> Result<&mut Self, ContractError>
    where
        T: Send + Sync + 'static,
        H: EventHandler<T>,
    {
        self.ensure_not_built()?;
        let pending = self.pending_mut::<T>()?;

        let type_id = TypeId::of::<H>();
        if pending.types.iter().any(|entry| entry.type_id == type_id) {
            return Err(ContractError::duplicate_registration(
                type_name::<T>(),
                type_name::<H>(),
            ));
        }

        pending.types.push(TypeEntry {
            type_id,
            handler_type: type_name::<H>(),
            make: lazy_factory::<T, H>,
        });
        debug!(
            event_type = type_name::<T>(),
            handler = type_name::<H>(),
            "Handler type registered"
        );
        Ok(self)
    }

    /// Register an owned handler instance for payload `T`
    pub fn register_handler_instance<T, H>(&mut self, handler: H) -> Result<&mut Self, ContractError>
    where
        T: Send + Sync + 'static,
        H: EventHandler<T>,
    {
        self.register_handler_arc::<T, H>(Arc::new(handler))
    }

    /// Register a shared handler instance for payload `T`
    ///
    /// # Errors
    /// `DuplicateRegistration` if the same instance is already registered for `T`.
    pub fn register_handler_arc<T, H>(&mut self, handler: Arc<H>) -> Result<&mut Self, ContractError>
    where
        T: Send + Sync + 'static,
        H: EventHandler<T>,
    {
        self.register_erased::<T>(type_name::<H>(), handler)
    }

    /// Register a closure handler for payload `T`; it accepts every event
    pub fn register_handler_fn<T, F>(&mut self, f: F) -> Result<&mut Self, ContractError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Event<T>) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_erased::<T>(type_name::<F>(), Arc::new(FnHandler::<T, F>::new(f)))
    }

    fn register_erased<T: Send + Sync + 'static>(
        &mut self,
        handler_type: &'static str,
        handler: Arc<dyn EventHandler<T>>,
    ) -> Result<&mut Self, ContractError> {
        self.ensure_not_built()?;
        let pending = self.pending_mut::<T>()?;

        let already = pending
            .instances
            .iter()
            .any(|entry| std::ptr::addr_eq(Arc::as_ptr(&entry.handler), Arc::as_ptr(&handler)));
        if already {
            return Err(ContractError::duplicate_registration(
                type_name::<T>(),
                handler_type,
            ));
        }

        pending.instances.push(InstanceEntry {
            handler_type,
            handler,
        });
        debug!(
            event_type = type_name::<T>(),
            handler = handler_type,
            "Handler instance registered"
        );
        Ok(self)
    }

    /// Build the notifier
    ///
    /// Per payload type, handlers dispatch in this order: instances, then
    /// types, each in insertion order.
    ///
    /// # Errors
    /// `AlreadyBuilt` on every call after the first successful one.
    #[instrument(
        name = "notifier_builder_build",
        skip_all,
        fields(event_types = self.order.len())
    )]
    pub fn build(&mut self, resolver: Arc<dyn HandlerResolver>) -> Result<Notifier, ContractError> {
        self.ensure_not_built()?;

        let mut bindings = HashMap::with_capacity(self.pending.len());
        let mut event_types = Vec::with_capacity(self.order.len());
        for type_id in &self.order {
            if let Some(pending) = self.pending.get(type_id) {
                event_types.push(pending.event_type());
                bindings.insert(*type_id, pending.materialize(&resolver));
            }
        }

        let notifier = Notifier::new(bindings, event_types, self.options.clone());
        info!(
            event_types = notifier.registered_events().len(),
            is_async = notifier.is_async(),
            "Notifier built"
        );
        self.notifier = Some(notifier.clone());
        Ok(notifier)
    }

    pub fn is_built(&self) -> bool {
        self.notifier.is_some()
    }

    /// The built notifier
    ///
    /// # Errors
    /// `NotBuilt` before `build`.
    pub fn instance(&self) -> Result<&Notifier, ContractError> {
        self.notifier.as_ref().ok_or(ContractError::NotBuilt)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Registered payload types, in first-registration order
    pub fn event_types(&self) -> Vec<&'static str> {
        self.order
            .iter()
            .filter_map(|type_id| self.pending.get(type_id))
            .map(|pending| pending.event_type())
            .collect()
    }

    /// Handler type names registered for `T`, in dispatch order
    pub fn handler_types_for<T: Send + Sync + 'static>(&self) -> Vec<&'static str> {
        self.pending
            .get(&TypeId::of::<T>())
            .map(|pending| pending.handler_types())
            .unwrap_or_default()
    }

    /// Handler instances registered for `T`, in insertion order
    pub fn handler_instances_for<T: Send + Sync + 'static>(&self) -> Vec<Arc<dyn EventHandler<T>>> {
        self.pending
            .get(&TypeId::of::<T>())
            .and_then(|pending| pending.as_any().downcast_ref::<Pending<T>>())
            .map(|pending| {
                pending
                    .instances
                    .iter()
                    .map(|entry| Arc::clone(&entry.handler))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn ensure_not_built(&self) -> Result<(), ContractError> {
        if self.notifier.is_some() {
            return Err(ContractError::AlreadyBuilt);
        }
        Ok(())
    }

    fn pending_mut<T: Send + Sync + 'static>(&mut self) -> Result<&mut Pending<T>, ContractError> {
        let type_id = TypeId::of::<T>();
        if !self.pending.contains_key(&type_id) {
            self.order.push(type_id);
        }
        self.pending
            .entry(type_id)
            .or_insert_with(|| {
                Box::new(Pending::<T> {
                    instances: Vec::new(),
                    types: Vec::new(),
                })
            })
            .as_any_mut()
            .downcast_mut::<Pending<T>>()
            .ok_or_else(|| {
                ContractError::invalid_argument("event_type", "binding stored under a foreign type id")
            })
    }
}

impl fmt::Debug for NotifierBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierBuilder")
            .field("options", &self.options)
            .field("event_types", &self.event_types())
            .field("built", &self.is_built())
            .finish()
    }
}
