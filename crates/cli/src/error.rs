//! Error types for CLI operations.

use thiserror::Error;

use contracts::ContractError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded
    #[error("Failed to load configuration from {path}: {source}")]
    ConfigLoad {
        path: String,
        #[source]
        source: ContractError,
    },

    /// Notifier could not be assembled
    #[error("Failed to set up notifier: {0}")]
    Setup(#[from] ContractError),

    /// Background units did not finish in time
    #[error("{pending} background unit(s) still running after {timeout_ms} ms")]
    SettleTimeout { pending: u64, timeout_ms: u64 },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_load(path: impl Into<String>, source: ContractError) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            source,
        }
    }

    pub fn settle_timeout(pending: u64, timeout_ms: u64) -> Self {
        Self::SettleTimeout {
            pending,
            timeout_ms,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
