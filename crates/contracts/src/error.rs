//! Layered error definitions
//!
//! Categorized by phase: registration / resolution / configuration / dispatch

use thiserror::Error;

use crate::HandlerFailures;

/// Boxed error used as the cause type of handler and consumer failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while building a notifier, resolving handlers or loading configuration
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Argument Errors =====
    /// Malformed argument (blank event name, invalid handler, ...)
    #[error("invalid argument '{argument}': {message}")]
    InvalidArgument { argument: String, message: String },

    // ===== Registration Errors =====
    /// Same (event type, handler) bound twice on one builder
    #[error("duplicate handler '{handler_type}' registered for event type '{event_type}'")]
    DuplicateRegistration {
        event_type: &'static str,
        handler_type: &'static str,
    },

    /// Builder mutated or rebuilt after `build()`
    #[error("notifier has already been built")]
    AlreadyBuilt,

    /// Built notifier requested before `build()`
    #[error("notifier is not yet built")]
    NotBuilt,

    // ===== Resolution Errors =====
    /// Resolver could not produce a handler instance
    #[error("failed to resolve handler '{handler_type}': {message}")]
    Resolution {
        handler_type: &'static str,
        message: String,
    },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create invalid argument error
    pub fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Create duplicate registration error
    pub fn duplicate_registration(event_type: &'static str, handler_type: &'static str) -> Self {
        Self::DuplicateRegistration {
            event_type,
            handler_type,
        }
    }

    /// Create resolution error
    pub fn resolution(handler_type: &'static str, message: impl Into<String>) -> Self {
        Self::Resolution {
            handler_type,
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors returned by `Notifier::notify`
///
/// `HandlerNotFound`, `InvalidArgument`, `Resolution` and `Scheduler` are always
/// local and immediate. `HandlersFailed` is only returned in synchronous mode;
/// asynchronous failures travel through error consumers and the task sink.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// No binding exists for the event's payload type
    #[error("handler not found for event type: {event_type}")]
    HandlerNotFound { event_type: &'static str },

    /// Malformed event
    #[error("invalid event: {message}")]
    InvalidArgument { message: String },

    /// A lazily registered handler could not be resolved
    #[error("handler resolution failed for event type '{event_type}'")]
    Resolution {
        event_type: &'static str,
        #[source]
        source: ContractError,
    },

    /// The background scheduler could not be created
    #[error("scheduler unavailable: {message}")]
    Scheduler { message: String },

    /// One or more handlers failed (synchronous mode)
    #[error(transparent)]
    HandlersFailed(#[from] HandlerFailures),
}

impl NotifyError {
    /// Create handler not found error for payload type `T`
    pub fn handler_not_found<T: 'static>() -> Self {
        Self::HandlerNotFound {
            event_type: std::any::type_name::<T>(),
        }
    }

    /// Failures carried by a `HandlersFailed` error
    pub fn handler_failures(&self) -> Option<&HandlerFailures> {
        match self {
            Self::HandlersFailed(failures) => Some(failures),
            _ => None,
        }
    }
}
