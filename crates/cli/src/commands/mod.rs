//! Command implementations.

mod demo;
mod info;
mod validate;

use std::path::Path;

use contracts::HeraldConfig;

use crate::error::{CliError, Result};

pub use demo::run_demo;
pub use info::run_info;
pub use validate::run_validate;

/// Load a configuration file, failing early if it does not exist
fn load_config(path: &Path) -> Result<HeraldConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    config_loader::ConfigLoader::load_from_path(path)
        .map_err(|e| CliError::config_load(path.display().to_string(), e))
}
