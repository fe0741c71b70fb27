//! Testing utilities and mocks for integration tests
//!
//! Provides mock implementations and test helpers for:
//! - MockTransport: scripted health responses per URL
//! - MockStream: controllable streaming connection
//! - EventLog: recorder for bus traffic
//! - Fixture builders for the default two-endpoint setup

pub mod mocks;
pub mod recorder;

pub use mocks::{MockStream, MockTransport, ProbeCall, ReconnectGate, ScriptedResponse};
pub use recorder::EventLog;

use crate::config::HealthCheckConfig;
use crate::endpoint::EndpointRegistry;
use crate::events::EventBus;
use crate::health::{CascadingHealthChecker, HealthProbe};
use std::sync::Arc;

pub const PRIMARY_URL: &str = "http://primary.test/health";
pub const SECONDARY_URL: &str = "http://secondary.test/health";

/// Registry over the two test URLs, primary active
pub fn test_registry() -> Arc<EndpointRegistry> {
    match EndpointRegistry::new(PRIMARY_URL, SECONDARY_URL) {
        Ok(registry) => Arc::new(registry),
        Err(e) => panic!("test endpoints are valid: {}", e),
    }
}

/// Checker over a mock transport with default tuning
pub fn test_checker(
    transport: Arc<MockTransport>,
    registry: Arc<EndpointRegistry>,
    bus: EventBus,
) -> CascadingHealthChecker {
    let probe = HealthProbe::new(transport, bus.clone());
    CascadingHealthChecker::new(probe, registry, bus, HealthCheckConfig::default())
}
