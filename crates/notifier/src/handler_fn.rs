//! Closure handlers

use std::marker::PhantomData;

use async_trait::async_trait;

use contracts::{Event, EventHandler, HandlerResult};

/// Handler backed by a closure; accepts every event of its payload type
pub struct FnHandler<T, F> {
    f: F,
    _payload: PhantomData<fn(&T)>,
}

impl<T, F> FnHandler<T, F>
where
    F: Fn(&Event<T>) -> HandlerResult,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F> EventHandler<T> for FnHandler<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&Event<T>) -> HandlerResult + Send + Sync + 'static,
{
    async fn handle_event(&self, event: &Event<T>) -> HandlerResult {
        (self.f)(event)
    }
}
