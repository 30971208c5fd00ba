//! EventHandler trait - the capability every handler implements
//!
//! Handlers are shared singletons: one instance serves every event of its
//! payload type, possibly from several background units at once.

use async_trait::async_trait;

use crate::{BoxError, Event};

/// Result returned by `EventHandler::handle_event`
pub type HandlerResult = Result<(), BoxError>;

/// Handler for events carrying a payload of type `T`
///
/// `handle_event` reports failure through its return value. A panic is still
/// captured by the notifier and reported like an error, but handlers should not
/// rely on that.
#[async_trait]
pub trait EventHandler<T>: Send + Sync + 'static {
    /// Filter deciding whether this handler takes part in dispatching `event`
    fn can_handle(&self, _event: &Event<T>) -> bool {
        true
    }

    /// Respond to the event
    ///
    /// # Errors
    /// Returns the cause of the failure; it is wrapped into a `HandlerFailure`.
    async fn handle_event(&self, event: &Event<T>) -> HandlerResult;
}
