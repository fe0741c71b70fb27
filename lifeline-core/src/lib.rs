//! Lifeline Core - connection recovery for long-lived clients
//!
//! Reconciles independent failure signals (machine sleep, refocus,
//! online/offline transitions, a dropped streaming connection) into one
//! coordinated recovery: health-check the backend, fail over to the secondary
//! endpoint if needed, then either rebuild the streaming connection or ask
//! dependent code to refresh.
//!
//! ## Guarantees
//! - **Single flight**: never two recovery runs at once
//! - **Debounce**: runs start at least one window after the previous run ended
//! - **Bounded**: one health check finishes within `worst_case_latency()`
//! - **Non-blocking**: `request_recovery` returns immediately
//!
//! ## Core Modules
//! - `core`: triggers, roles, outcomes, errors and the phase state machine
//! - `endpoint`: primary/secondary selection
//! - `events`: recovery notifications
//! - `health`: probe and cascading checker
//! - `streaming`: streaming-connection contract and reconnect supervisor
//! - `recovery`: the orchestrator
//! - `triggers`: sleep and connectivity detectors
//! - `monitoring`: Prometheus metrics and the status server

pub mod core;
pub mod config;
pub mod endpoint;
pub mod events;
pub mod health;
pub mod monitoring;
pub mod recovery;
pub mod resilience;
pub mod streaming;
pub mod triggers;
pub mod utils;

// Mocks and fixtures, shared with integration tests
pub mod testing;

pub use crate::core::{
    EndpointRole, HealthVerdict, ProbeOutcome, RecoveryError, RecoveryPhase, RecoveryTrigger,
};
pub use config::Config;
pub use endpoint::EndpointRegistry;
pub use events::{EventBus, EventKind, RecoveryEvent};
pub use health::{CascadingHealthChecker, HealthProbe, HyperTransport};
pub use recovery::{RecoveryOrchestrator, RecoveryStatus, RequestOutcome};
pub use streaming::StreamingConnection;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::core::{EndpointRole, HealthVerdict, ProbeOutcome, RecoveryPhase, RecoveryTrigger};

    pub use crate::config::{Config, HealthCheckConfig, RecoveryConfig};
    pub use crate::endpoint::EndpointRegistry;
    pub use crate::events::{EventBus, EventKind, RecoveryEvent, Subscription};
    pub use crate::health::{CascadingHealthChecker, HealthProbe, HealthTransport, HyperTransport};
    pub use crate::recovery::{RecoveryOrchestrator, RecoveryStatus, RequestOutcome};
    pub use crate::streaming::StreamingConnection;
    pub use crate::triggers::{ConnectivityMonitor, SleepDetector, TriggerSink};
}
