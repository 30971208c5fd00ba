//! `demo` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use config_loader::ConfigLoader;
use notifier::CancellationToken;

use crate::cli::DemoArgs;
use crate::demo::{Demo, DemoConfig};

/// Execute the `demo` command
pub async fn run_demo(args: &DemoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let config = super::load_config(&args.config)?;
    for warning in ConfigLoader::warnings(&config) {
        warn!(%warning, "Configuration warning");
    }

    // CLI flag wins over the file; 0 disables the exporter
    let metrics_port = args.metrics_port.or(config.logging.metrics_port);
    if let Some(port) = metrics_port.filter(|&port| port > 0) {
        observability::init_metrics_only(port)?;
        info!("Metrics endpoint available on port {}", port);
    }

    let demo_config = DemoConfig {
        dispatch: config.dispatch.clone(),
        events: args.events,
        fail_every: args.fail_every(),
        handler_delay: Duration::from_millis(args.handler_delay_ms),
        failing_consumer: args.failing_consumer,
        settle_timeout: Duration::from_millis(args.settle_timeout_ms),
    };

    // Ctrl+C stops raising events; units not yet started finish as cancelled
    let cancellation = CancellationToken::new();
    let shutdown = tokio::spawn(cancel_on_shutdown_signal(cancellation.clone()));

    let result = Demo::new(demo_config, cancellation).run().await;
    shutdown.abort();
    let report = result.context("Demo run failed")?;

    info!(
        events = report.events_raised,
        notify_errors = report.notify_errors,
        duration_secs = report.duration.as_secs_f64(),
        "Demo finished"
    );

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        report.print_summary();
    }

    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn cancel_on_shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Received shutdown signal, stopping demo...");
    token.cancel();
}
