//! HeraldConfig - Config Loader output
//!
//! Serializable part of the notifier configuration. Callbacks (error
//! consumers, task sink) and cancellation tokens are attached in code.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct HeraldConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Dispatch behaviour
    #[serde(default)]
    #[validate(nested)]
    pub dispatch: DispatchConfig,

    /// Logging and metrics export
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// How `notify` executes handlers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Caller awaits every handler
    #[default]
    Sync,
    /// Fire-and-forget background unit per notification
    Async,
}

/// Dispatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    #[serde(default)]
    pub mode: DispatchMode,

    /// Scheduler used in async mode
    #[serde(default)]
    #[validate(nested)]
    pub scheduler: SchedulerConfig,

    /// Task creation hints used in async mode
    #[serde(default)]
    pub task: TaskConfig,
}

/// Where background units run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// The tokio runtime active when the first async notification is raised
    #[default]
    Ambient,
    /// A runtime owned by the notifier
    Dedicated,
}

/// Scheduler configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub kind: SchedulerKind,

    /// Worker threads of a dedicated runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 1024))]
    pub worker_threads: Option<usize>,

    /// Thread name prefix of a dedicated runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 64))]
    pub thread_name: Option<String>,
}

/// Task creation hints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Run each unit on a dedicated blocking thread
    #[serde(default)]
    pub long_running: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,

    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    #[validate(length(min = 1))]
    pub level: String,

    /// Prometheus exporter port (None = disabled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
            metrics_port: None,
        }
    }
}
