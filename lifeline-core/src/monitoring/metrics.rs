//! Prometheus metrics for connection recovery
//!
//! Provides metrics for:
//! - Recovery requests per trigger and gate decision
//! - Run outcomes and durations
//! - Probe outcomes per endpoint role
//! - Endpoint switches and the active endpoint

use crate::core::{EndpointRole, ProbeOutcome, RecoveryTrigger};
use anyhow::{Context, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;
use tracing::info;

/// Registry plus every recovery metric family
pub struct RecoveryMetrics {
    registry: Registry,
    requests: IntCounterVec,
    runs: IntCounterVec,
    probes: IntCounterVec,
    switches: IntCounterVec,
    run_duration: Histogram,
    active_primary: IntGauge,
}

impl RecoveryMetrics {
    /// Create a new metrics registry with all metric families
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new(
                "lifeline_recovery_requests_total",
                "Recovery requests by trigger and gate decision",
            ),
            &["trigger", "outcome"],
        )?;
        registry.register(Box::new(requests.clone()))?;

        let runs = IntCounterVec::new(
            Opts::new("lifeline_recovery_runs_total", "Completed recovery runs by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(runs.clone()))?;

        let probes = IntCounterVec::new(
            Opts::new("lifeline_probes_total", "Health probes by endpoint role and outcome"),
            &["role", "outcome"],
        )?;
        registry.register(Box::new(probes.clone()))?;

        let switches = IntCounterVec::new(
            Opts::new("lifeline_endpoint_switches_total", "Endpoint switches by target role"),
            &["to"],
        )?;
        registry.register(Box::new(switches.clone()))?;

        let run_duration = Histogram::with_opts(
            HistogramOpts::new(
                "lifeline_recovery_run_duration_seconds",
                "Wall time of a recovery run",
            )
            .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(run_duration.clone()))?;

        let active_primary = IntGauge::new(
            "lifeline_active_endpoint_primary",
            "1 when the primary endpoint is active, 0 on the secondary",
        )?;
        registry.register(Box::new(active_primary.clone()))?;
        active_primary.set(1);

        info!("Recovery metrics registry initialized");

        Ok(Self {
            registry,
            requests,
            runs,
            probes,
            switches,
            run_duration,
            active_primary,
        })
    }

    /// Get the underlying Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_request(&self, trigger: RecoveryTrigger, outcome: &str) {
        self.requests
            .with_label_values(&[trigger.as_str(), outcome])
            .inc();
    }

    pub fn record_run(&self, outcome: &str, duration: Duration) {
        self.runs.with_label_values(&[outcome]).inc();
        self.run_duration.observe(duration.as_secs_f64());
    }

    pub fn record_probe(&self, role: EndpointRole, outcome: ProbeOutcome) {
        self.probes
            .with_label_values(&[role.as_str(), outcome.as_str()])
            .inc();
    }

    pub fn record_switch(&self, to: EndpointRole) {
        self.switches.with_label_values(&[to.as_str()]).inc();
        self.set_active_endpoint(to);
    }

    pub fn set_active_endpoint(&self, role: EndpointRole) {
        self.active_primary.set(i64::from(role.is_primary()));
    }

    pub fn request_count(&self, trigger: RecoveryTrigger, outcome: &str) -> u64 {
        self.requests
            .with_label_values(&[trigger.as_str(), outcome])
            .get()
    }

    pub fn run_count(&self, outcome: &str) -> u64 {
        self.runs.with_label_values(&[outcome]).get()
    }

    pub fn probe_count(&self, role: EndpointRole, outcome: ProbeOutcome) -> u64 {
        self.probes
            .with_label_values(&[role.as_str(), outcome.as_str()])
            .get()
    }

    pub fn switch_count(&self, to: EndpointRole) -> u64 {
        self.switches.with_label_values(&[to.as_str()]).get()
    }

    pub fn active_endpoint_primary(&self) -> i64 {
        self.active_primary.get()
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("Failed to encode metrics")?;

        String::from_utf8(buffer).context("Invalid UTF-8 in metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = RecoveryMetrics::new().unwrap();
        assert_eq!(metrics.active_endpoint_primary(), 1);
        assert_eq!(metrics.run_count("healthy"), 0);
    }

    #[test]
    fn test_switch_updates_gauge() {
        let metrics = RecoveryMetrics::new().unwrap();

        metrics.record_switch(EndpointRole::Secondary);
        assert_eq!(metrics.active_endpoint_primary(), 0);
        assert_eq!(metrics.switch_count(EndpointRole::Secondary), 1);

        metrics.record_switch(EndpointRole::Primary);
        assert_eq!(metrics.active_endpoint_primary(), 1);
    }

    #[test]
    fn test_encode_contains_families() {
        let metrics = RecoveryMetrics::new().unwrap();
        metrics.record_request(RecoveryTrigger::Focus, "started");
        metrics.record_run("healthy", Duration::from_millis(120));

        let text = metrics.encode().unwrap();
        assert!(text.contains("lifeline_recovery_requests_total"));
        assert!(text.contains("trigger=\"focus\""));
        assert!(text.contains("lifeline_recovery_run_duration_seconds"));
        assert!(text.contains("lifeline_active_endpoint_primary 1"));
    }
}
