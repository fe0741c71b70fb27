//! Domain-specific error types for recovery operations
//!
//! None of these escape the orchestrator's public entry points. They exist so
//! that failures are classified precisely before being logged and folded into
//! "try again on the next trigger".

use std::time::Duration;
use thiserror::Error;

/// Transport-level failure of a single health probe
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The health URL could not be parsed
    #[error("invalid health URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connection refused, DNS failure, reset, ...
    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    /// No response within the probe deadline
    #[error("probe of {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

/// Failure reported by the streaming layer while reconnecting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("reconnect failed: {0}")]
    ReconnectFailed(String),

    #[error("streaming connection closed")]
    Closed,
}

/// Run-level failures inside the orchestrator
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// A collaborator failed or panicked during a run
    #[error("recovery run failed: {reason}")]
    RunFailure { reason: String },

    /// The reconnect supervisor has been shut down
    #[error("reconnect supervisor is stopped")]
    SupervisorStopped,

    /// Construction outside a tokio runtime
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}

/// Invalid endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("{role} endpoint URL is empty")]
    EmptyUrl { role: &'static str },

    #[error("primary and secondary endpoints are identical ({url})")]
    Identical { url: String },
}
