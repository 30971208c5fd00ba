//! Handler bindings - the per-payload-type handler lists held by a notifier

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use contracts::{ContractError, Event, EventHandler};

/// Resolves a handler on first use
pub(crate) type LazyFactory<T> =
    Box<dyn Fn() -> Result<Arc<dyn EventHandler<T>>, ContractError> + Send + Sync>;

/// A registered handler: an instance, or a factory resolved at most once
///
/// Concurrent first uses block on the same initialization, so the factory runs
/// once per successful resolution. A failed resolution leaves the cell empty.
pub(crate) struct HandlerRef<T> {
    handler_type: &'static str,
    cell: OnceCell<Arc<dyn EventHandler<T>>>,
    factory: Option<LazyFactory<T>>,
}

impl<T: Send + Sync + 'static> HandlerRef<T> {
    pub(crate) fn instance(handler_type: &'static str, handler: Arc<dyn EventHandler<T>>) -> Self {
        Self {
            handler_type,
            cell: OnceCell::with_value(handler),
            factory: None,
        }
    }

    pub(crate) fn lazy(handler_type: &'static str, factory: LazyFactory<T>) -> Self {
        Self {
            handler_type,
            cell: OnceCell::new(),
            factory: Some(factory),
        }
    }

    pub(crate) fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    pub(crate) fn get(&self) -> Result<&Arc<dyn EventHandler<T>>, ContractError> {
        self.cell.get_or_try_init(|| {
            let factory = self.factory.as_ref().ok_or_else(|| {
                ContractError::resolution(self.handler_type, "handler has no factory")
            })?;
            debug!(handler = self.handler_type, "Resolving handler");
            factory()
        })
    }
}

/// A resolved handler selected for one dispatch
pub(crate) struct ResolvedHandler<T> {
    pub(crate) handler_type: &'static str,
    pub(crate) handler: Arc<dyn EventHandler<T>>,
}

/// Ordered handler list for one payload type
pub(crate) struct HandlerBinding<T> {
    refs: Vec<HandlerRef<T>>,
}

impl<T: Send + Sync + 'static> HandlerBinding<T> {
    pub(crate) fn new(refs: Vec<HandlerRef<T>>) -> Self {
        Self { refs }
    }

    pub(crate) fn len(&self) -> usize {
        self.refs.len()
    }

    pub(crate) fn handler_types(&self) -> Vec<&'static str> {
        self.refs.iter().map(HandlerRef::handler_type).collect()
    }

    /// Resolve every handler, then keep those whose `can_handle` accepts `event`
    pub(crate) fn matching(&self, event: &Event<T>) -> Result<Vec<ResolvedHandler<T>>, ContractError> {
        let mut matched = Vec::with_capacity(self.refs.len());
        for handler_ref in &self.refs {
            let handler = handler_ref.get()?;
            if handler.can_handle(event) {
                matched.push(ResolvedHandler {
                    handler_type: handler_ref.handler_type,
                    handler: Arc::clone(handler),
                });
            }
        }
        Ok(matched)
    }
}
