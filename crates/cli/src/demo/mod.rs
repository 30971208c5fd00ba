//! Demo scenario: a small order workflow driven through a notifier.

mod handlers;
mod orchestrator;
mod stats;

pub use orchestrator::{Demo, DemoConfig};
