//! Long-running recovery daemon
//!
//! Composition root for the recovery core:
//! - endpoint registry, event bus, HTTP probe and cascading checker
//! - recovery orchestrator over a headless streaming stand-in
//! - sleep detector and connectivity monitor as trigger sources
//! - status server (`/metrics`, `/status`) when monitoring is enabled
//!
//! Lines on stdin drive it by hand:
//! - `online`, `sleep`, `focus`, `realtime-disconnect`: request recovery
//! - `offline` / `up`: report connectivity changes
//! - `drop`: simulate the streaming connection dropping
//! - `status`: print the current snapshot as JSON
//! - `cancel`: disarm any pending run

use anyhow::{Context, Result};
use clap::Parser;
use lifeline_bins::common::{log_events, CommonArgs, HeadlessStream};
use lifeline_core::health::{CascadingHealthChecker, HealthProbe, HyperTransport};
use lifeline_core::monitoring::{RecoveryMetrics, StatusServer, StatusServerConfig};
use lifeline_core::recovery::RecoveryOrchestrator;
use lifeline_core::triggers::{ConnectivityMonitor, SleepDetector};
use lifeline_core::{EventBus, RecoveryTrigger};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the lifeline recovery orchestrator")]
struct WatchArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Ignore stdin commands
    #[arg(long)]
    no_stdin: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = WatchArgs::parse();
    let config = args.common.load_config()?;
    args.common.init_logging(&config)?;

    info!("=== Lifeline: connection recovery ===");
    info!(
        primary = %config.endpoints.primary,
        secondary = %config.endpoints.secondary,
        "Endpoints"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        warn!("Received Ctrl+C, initiating graceful shutdown...");
        shutdown_tx.send_replace(true);
    })
    .context("Failed to install Ctrl+C handler")?;

    let bus = EventBus::new();
    let _subscriptions = log_events(&bus);
    let registry = Arc::new(config.endpoint_registry()?);
    let probe = HealthProbe::new(Arc::new(HyperTransport::new()), bus.clone());
    let mut checker =
        CascadingHealthChecker::new(probe, registry, bus.clone(), config.health.clone());
    let stream = Arc::new(HeadlessStream::new());

    let metrics = if config.monitoring.enabled {
        let metrics = Arc::new(RecoveryMetrics::new().context("Failed to create metrics")?);
        checker = checker.with_metrics(metrics.clone());
        Some(metrics)
    } else {
        None
    };

    let mut builder =
        RecoveryOrchestrator::builder(config.recovery.clone(), checker, stream.clone(), bus);
    if let Some(metrics) = &metrics {
        builder = builder.metrics(metrics.clone());
    }
    let orchestrator = builder.build()?;

    let server = match &metrics {
        Some(metrics) => {
            let server_config = StatusServerConfig::new(config.monitoring_addr()?);
            let server = StatusServer::new(server_config, metrics.clone())
                .with_status(Arc::new(orchestrator.clone()));
            Some(tokio::spawn(async move {
                if let Err(e) = server.serve().await {
                    warn!(error = %e, "Status server stopped");
                }
            }))
        }
        None => None,
    };

    let sink = Arc::new(orchestrator.clone());
    let detector = SleepDetector::from_config(&config.triggers).spawn(sink.clone())?;
    let connectivity = ConnectivityMonitor::new(sink, false);

    // Coming up counts as coming online
    connectivity.report(true);

    let commands = async {
        if args.no_stdin {
            return std::future::pending::<()>().await;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim() {
                "" => {}
                "offline" => {
                    connectivity.report(false);
                }
                "up" => {
                    connectivity.report(true);
                }
                "drop" => stream.drop_connection(),
                "cancel" => orchestrator.cancel(),
                "status" => match serde_json::to_string_pretty(&orchestrator.snapshot()) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!(error = %e, "Failed to serialize status"),
                },
                other => match other.parse::<RecoveryTrigger>() {
                    Ok(trigger) => {
                        let outcome = orchestrator.request_recovery(trigger);
                        info!(trigger = %trigger, outcome = outcome.as_str(), "Manual trigger");
                    }
                    Err(e) => warn!("{}", e),
                },
            }
        }

        // stdin closed; keep running until Ctrl+C
        std::future::pending::<()>().await
    };

    tokio::select! {
        _ = shutdown_rx.wait_for(|stop| *stop) => {}
        _ = commands => {}
    }

    orchestrator.shutdown();
    detector.abort();
    if let Some(server) = server {
        server.abort();
    }

    let stats = orchestrator.stats();
    info!("=== Final Statistics ===");
    info!("Requests: {}", stats.requests);
    info!("Runs started: {}", stats.runs_started);
    info!(
        "Healthy / unhealthy / failed: {} / {} / {}",
        stats.healthy_runs, stats.unhealthy_runs, stats.run_failures
    );
    info!(
        "Dropped while running: {}, coalesced: {}",
        stats.dropped_running, stats.coalesced
    );
    info!("Shutdown complete");

    Ok(())
}
