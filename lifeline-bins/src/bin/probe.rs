//! One-shot backend health check
//!
//! Probes one URL (default: the configured primary) or runs the full
//! cascading check across both endpoints. Exits 0 when healthy, 1 otherwise,
//! so it can back shell scripts and container health checks.

use anyhow::Result;
use clap::Parser;
use lifeline_bins::common::{log_events, CommonArgs};
use lifeline_core::health::{CascadingHealthChecker, HealthProbe, HyperTransport};
use lifeline_core::EventBus;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Probe lifeline health endpoints")]
struct ProbeArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// URL to probe instead of the configured primary
    #[arg(short, long, conflicts_with = "cascade")]
    url: Option<String>,

    /// Run the full cascading check (retries, failover, failback)
    #[arg(long)]
    cascade: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = ProbeArgs::parse();
    let config = args.common.load_config()?;
    args.common.init_logging(&config)?;

    let bus = EventBus::new();
    let _subscriptions = log_events(&bus);
    let probe = HealthProbe::new(Arc::new(HyperTransport::new()), bus.clone());

    let healthy = if args.cascade {
        let registry = Arc::new(config.endpoint_registry()?);
        let checker =
            CascadingHealthChecker::new(probe, registry.clone(), bus, config.health.clone());
        info!(
            worst_case = ?checker.worst_case_latency(),
            "Running cascading health check"
        );

        let verdict = checker.check().await;
        let active = registry.snapshot();
        println!(
            "{} (active: {} {})",
            if verdict.is_healthy() { "healthy" } else { "unhealthy" },
            active.active_role,
            active.active_url
        );
        verdict.is_healthy()
    } else {
        let url = args.url.unwrap_or_else(|| config.endpoints.primary.clone());
        let outcome = probe.probe(&url, config.health.probe_timeout()).await;
        println!("{} {}", outcome.as_str(), url);
        outcome.is_network_healthy()
    };

    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
