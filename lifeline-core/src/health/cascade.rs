//! Cascading Health Checker - retries on the active endpoint, then failover
//!
//! Algorithm:
//! 1. Probe the active endpoint up to `max_retries` times with exponential
//!    backoff between attempts. Stop on the first healthy outcome.
//! 2. Healthy and active is not primary: one single-shot probe of the primary.
//!    If that succeeds, fail back (`endpointSwitched { isPrimary: true }`).
//!    Either way the verdict is `Healthy`.
//! 3. Retries exhausted: one single-shot probe of the other endpoint. If it
//!    succeeds, fail over (`endpointSwitched`) and report `Healthy`.
//! 4. Otherwise `Unhealthy`.
//!
//! ## Latency bound
//!
//! `max_retries × probe_timeout + Σ backoff + probe_timeout`. With defaults
//! (3 × 5 s + 1.5 s + 3 s + 5 s) that is 24.5 s. Callers that display progress
//! should budget for it; see [`CascadingHealthChecker::worst_case_latency`].

use super::probe::HealthProbe;
use crate::config::HealthCheckConfig;
use crate::core::{EndpointRole, HealthVerdict, ProbeOutcome};
use crate::endpoint::EndpointRegistry;
use crate::events::{EventBus, RecoveryEvent};
use crate::monitoring::RecoveryMetrics;
use crate::resilience::ExponentialBackoff;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct CascadingHealthChecker {
    probe: HealthProbe,
    registry: Arc<EndpointRegistry>,
    bus: EventBus,
    config: HealthCheckConfig,
    metrics: Option<Arc<RecoveryMetrics>>,
}

impl CascadingHealthChecker {
    pub fn new(
        probe: HealthProbe,
        registry: Arc<EndpointRegistry>,
        bus: EventBus,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            probe,
            registry,
            bus,
            config,
            metrics: None,
        }
    }

    /// Record probe outcomes and endpoint switches in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<RecoveryMetrics>) -> Self {
        metrics.set_active_endpoint(self.registry.active_role());
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// Upper bound on how long [`check`](Self::check) can take
    pub fn worst_case_latency(&self) -> Duration {
        let timeout = self.config.probe_timeout();
        let backoff = self.config.backoff().total_delay().unwrap_or_default();
        timeout * self.config.max_retries + backoff + timeout
    }

    /// Run the cascading check and switch endpoints as needed
    pub async fn check(&self) -> HealthVerdict {
        let active = self.registry.active_role();

        if self.probe_with_retries(active).await {
            if !active.is_primary() {
                self.try_failback().await;
            }
            return HealthVerdict::Healthy;
        }

        let alternate = active.other();
        warn!(
            active = %active,
            attempts = self.config.max_retries,
            fallback = %alternate,
            "Active endpoint unreachable after retries, probing fallback"
        );

        if self.probe_once(alternate).await {
            self.switch(active, alternate);
            return HealthVerdict::Healthy;
        }

        warn!("Both endpoints unreachable, giving up until next trigger");
        HealthVerdict::Unhealthy
    }

    fn counts_as_healthy(&self, outcome: ProbeOutcome) -> bool {
        match outcome {
            ProbeOutcome::Reachable => true,
            ProbeOutcome::AuthExpired => self.config.auth_expired_is_healthy,
            ProbeOutcome::Unreachable => false,
        }
    }

    async fn probe_once(&self, role: EndpointRole) -> bool {
        let url = &self.registry.endpoint(role).health_url;
        let outcome = self.probe.probe(url, self.config.probe_timeout()).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_probe(role, outcome);
        }

        self.counts_as_healthy(outcome)
    }

    async fn probe_with_retries(&self, role: EndpointRole) -> bool {
        let mut backoff = ExponentialBackoff::with_config(self.config.backoff());

        for attempt in 1..=self.config.max_retries {
            if self.probe_once(role).await {
                if attempt > 1 {
                    info!(endpoint = %role, attempt, "Endpoint recovered after retry");
                }
                return true;
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_delay() {
                    debug!(endpoint = %role, attempt, ?delay, "Backing off before next probe");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        false
    }

    async fn try_failback(&self) {
        if self.probe_once(EndpointRole::Primary).await {
            self.switch(EndpointRole::Secondary, EndpointRole::Primary);
        } else {
            debug!("Primary still unreachable, staying on secondary");
        }
    }

    fn switch(&self, from: EndpointRole, to: EndpointRole) {
        if !self.registry.switch(from, to) {
            return;
        }

        let url = self.registry.endpoint(to).health_url.clone();
        if let Some(metrics) = &self.metrics {
            metrics.record_switch(to);
        }
        self.bus.publish(RecoveryEvent::EndpointSwitched {
            is_primary: to.is_primary(),
            url,
        });
    }
}
