//! # Contracts
//!
//! Frozen interface contracts shared by every Herald crate: the event type,
//! the handler and resolver traits, the failure model and the serializable
//! configuration. Business crates depend on this crate only, never the reverse.
//!
//! ## Failure Model
//! - Handlers report errors through their return value
//! - Synchronous dispatch returns `HandlerFailures`
//! - Asynchronous dispatch delivers a `TaskOutcome` to the task sink

mod config;
mod error;
mod event;
mod failure;
mod handler;
mod resolver;

pub use config::*;
pub use error::*;
pub use event::Event;
pub use failure::*;
pub use handler::{EventHandler, HandlerResult};
pub use resolver::HandlerResolver;

/// Re-exported so handler implementations need no direct dependency
pub use async_trait::async_trait;
