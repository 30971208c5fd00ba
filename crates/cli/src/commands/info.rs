//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{DispatchMode, HeraldConfig, SchedulerKind};
use notifier::DEFAULT_THREAD_NAME;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    dispatch: DispatchInfo,
    logging: LoggingInfo,
}

#[derive(Serialize)]
struct DispatchInfo {
    mode: DispatchMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduler: Option<SchedulerInfo>,
}

#[derive(Serialize)]
struct SchedulerInfo {
    kind: SchedulerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    worker_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_name: Option<String>,
    long_running: bool,
}

#[derive(Serialize)]
struct LoggingInfo {
    format: contracts::LogFormat,
    level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_port: Option<u16>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = super::load_config(&args.config)?;

    if args.json {
        let info = build_config_info(&config);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn build_config_info(config: &HeraldConfig) -> ConfigInfo {
    let dispatch = &config.dispatch;

    // Scheduler settings only take effect in async mode
    let scheduler = (dispatch.mode == DispatchMode::Async).then(|| {
        let dedicated = dispatch.scheduler.kind == SchedulerKind::Dedicated;
        SchedulerInfo {
            kind: dispatch.scheduler.kind,
            worker_threads: dedicated.then(|| dispatch.scheduler.worker_threads.unwrap_or(1)),
            thread_name: dedicated.then(|| {
                dispatch
                    .scheduler
                    .thread_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_THREAD_NAME.to_string())
            }),
            long_running: dispatch.task.long_running,
        }
    });

    ConfigInfo {
        version: format!("{:?}", config.version),
        dispatch: DispatchInfo {
            mode: dispatch.mode,
            scheduler,
        },
        logging: LoggingInfo {
            format: config.logging.format,
            level: config.logging.level.clone(),
            metrics_port: config.logging.metrics_port,
        },
    }
}

fn print_config_info(config: &HeraldConfig) {
    let info = build_config_info(config);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Herald Configuration                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📨 Dispatch");
    println!("   ├─ Version: {}", info.version);
    match &info.dispatch.scheduler {
        None => {
            println!("   └─ Mode: {:?} (handlers run on the caller)", info.dispatch.mode);
        }
        Some(scheduler) => {
            println!("   ├─ Mode: {:?} (fire-and-forget)", info.dispatch.mode);
            println!("   ├─ Scheduler: {:?}", scheduler.kind);
            if let Some(threads) = scheduler.worker_threads {
                println!("   │  ├─ Worker threads: {}", threads);
            }
            if let Some(ref name) = scheduler.thread_name {
                println!("   │  └─ Thread name: {}", name);
            }
            println!("   └─ Long-running units: {}", scheduler.long_running);
        }
    }

    println!("\n📝 Logging");
    println!("   ├─ Format: {:?}", info.logging.format);
    println!("   ├─ Level: {}", info.logging.level);
    match info.logging.metrics_port {
        Some(port) => println!("   └─ Metrics: http://0.0.0.0:{}/metrics", port),
        None => println!("   └─ Metrics: disabled"),
    }

    println!();
}
