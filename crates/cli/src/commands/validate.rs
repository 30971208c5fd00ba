//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::ConfigLoader;
use contracts::{HeraldConfig, SchedulerKind};

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    mode: String,
    scheduler: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    worker_threads: Option<usize>,
    long_running: bool,
    log_level: String,
}

impl From<&HeraldConfig> for ConfigSummary {
    fn from(config: &HeraldConfig) -> Self {
        let dispatch = &config.dispatch;
        Self {
            version: format!("{:?}", config.version),
            mode: format!("{:?}", dispatch.mode).to_lowercase(),
            scheduler: format!("{:?}", dispatch.scheduler.kind).to_lowercase(),
            worker_threads: match dispatch.scheduler.kind {
                SchedulerKind::Dedicated => Some(dispatch.scheduler.worker_threads.unwrap_or(1)),
                SchedulerKind::Ambient => None,
            },
            long_running: dispatch.task.long_running,
            log_level: config.logging.level.clone(),
        }
    }
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match super::load_config(&args.config) {
        Ok(config) => {
            let warnings = ConfigLoader::warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary::from(&config)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Mode: {}", summary.mode);
            println!("  Scheduler: {}", summary.scheduler);
            if let Some(threads) = summary.worker_threads {
                println!("  Worker threads: {}", threads);
            }
            println!("  Long-running units: {}", summary.long_running);
            println!("  Log level: {}", summary.log_level);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
