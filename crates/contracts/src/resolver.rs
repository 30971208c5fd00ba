//! HandlerResolver - lazy handler instantiation
//!
//! The notifier asks the resolver for a handler type the first time an event
//! needs it, and caches the result for the notifier's lifetime.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::ContractError;

/// Produces handler instances by type
pub trait HandlerResolver: Send + Sync {
    /// Resolve an instance of the handler identified by `handler_type`
    ///
    /// The returned value must downcast to the requested handler type.
    ///
    /// # Errors
    /// Returns `ContractError::Resolution` if no instance can be produced.
    fn resolve(
        &self,
        handler_type: TypeId,
        type_name: &'static str,
    ) -> Result<Arc<dyn Any + Send + Sync>, ContractError>;
}

impl dyn HandlerResolver {
    /// Resolve and downcast to a concrete handler type
    pub fn resolve_as<H: Send + Sync + 'static>(&self) -> Result<Arc<H>, ContractError> {
        let type_name = std::any::type_name::<H>();
        self.resolve(TypeId::of::<H>(), type_name)?
            .downcast::<H>()
            .map_err(|_| ContractError::resolution(type_name, "resolved instance has a different type"))
    }
}
