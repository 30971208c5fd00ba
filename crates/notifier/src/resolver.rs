//! Factory-backed handler resolver
//!
//! Minimal stand-in for a dependency-injection container: each handler type
//! maps to a factory closure.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use contracts::{BoxError, ContractError, HandlerResolver};

type Factory = Box<dyn Fn() -> Result<Arc<dyn Any + Send + Sync>, BoxError> + Send + Sync>;

/// Resolver mapping handler types to factories
#[derive(Default)]
pub struct FactoryResolver {
    factories: HashMap<TypeId, Factory>,
}

impl FactoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fallible factory for `H`, replacing any previous one
    pub fn register<H, F>(&mut self, factory: F) -> &mut Self
    where
        H: Send + Sync + 'static,
        F: Fn() -> Result<H, BoxError> + Send + Sync + 'static,
    {
        self.factories.insert(
            TypeId::of::<H>(),
            Box::new(move || factory().map(|h| Arc::new(h) as Arc<dyn Any + Send + Sync>)),
        );
        self
    }

    /// Register `H::default` as the factory for `H`
    pub fn register_default<H>(&mut self) -> &mut Self
    where
        H: Default + Send + Sync + 'static,
    {
        self.register::<H, _>(|| Ok(H::default()))
    }

    /// Resolve `H` to an existing shared instance
    pub fn register_instance<H>(&mut self, instance: Arc<H>) -> &mut Self
    where
        H: Send + Sync + 'static,
    {
        self.factories.insert(
            TypeId::of::<H>(),
            Box::new(move || Ok(Arc::clone(&instance) as Arc<dyn Any + Send + Sync>)),
        );
        self
    }

    pub fn contains<H: 'static>(&self) -> bool {
        self.factories.contains_key(&TypeId::of::<H>())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl HandlerResolver for FactoryResolver {
    fn resolve(
        &self,
        handler_type: TypeId,
        type_name: &'static str,
    ) -> Result<Arc<dyn Any + Send + Sync>, ContractError> {
        trace!(handler = type_name, "Resolving handler from factory");
        let factory = self
            .factories
            .get(&handler_type)
            .ok_or_else(|| ContractError::resolution(type_name, "no factory registered"))?;
        factory().map_err(|e| ContractError::resolution(type_name, e.to_string()))
    }
}

/// Resolver for builders that only register handler instances
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyResolver;

impl HandlerResolver for EmptyResolver {
    fn resolve(
        &self,
        _handler_type: TypeId,
        type_name: &'static str,
    ) -> Result<Arc<dyn Any + Send + Sync>, ContractError> {
        Err(ContractError::resolution(type_name, "no resolver configured"))
    }
}
