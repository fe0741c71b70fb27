//! Vocabulary types shared by every recovery component
//!
//! - `RecoveryTrigger`: why recovery was requested (label only)
//! - `EndpointRole`: primary or secondary backend address
//! - `ProbeOutcome`: classification of a single reachability check
//! - `HealthVerdict`: result of a full cascading check

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reason a recovery was requested.
///
/// Carried for logging and metrics only; every trigger passes through the
/// same debounce / single-flight gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryTrigger {
    /// Network came back online
    Online,
    /// Machine woke up from sleep (or a long idle stall)
    Sleep,
    /// Window regained focus
    Focus,
    /// Persistent streaming connection dropped
    RealtimeDisconnect,
}

impl RecoveryTrigger {
    /// All trigger variants, in declaration order
    pub const ALL: [RecoveryTrigger; 4] = [
        RecoveryTrigger::Online,
        RecoveryTrigger::Sleep,
        RecoveryTrigger::Focus,
        RecoveryTrigger::RealtimeDisconnect,
    ];

    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryTrigger::Online => "online",
            RecoveryTrigger::Sleep => "sleep",
            RecoveryTrigger::Focus => "focus",
            RecoveryTrigger::RealtimeDisconnect => "realtime-disconnect",
        }
    }
}

impl fmt::Display for RecoveryTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown trigger label
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown recovery trigger '{0}'")]
pub struct UnknownTrigger(pub String);

impl FromStr for RecoveryTrigger {
    type Err = UnknownTrigger;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecoveryTrigger::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTrigger(s.to_string()))
    }
}

/// Role of a backend endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum EndpointRole {
    Primary = 0,
    Secondary = 1,
}

impl EndpointRole {
    /// The other role
    pub fn other(self) -> Self {
        match self {
            EndpointRole::Primary => EndpointRole::Secondary,
            EndpointRole::Secondary => EndpointRole::Primary,
        }
    }

    pub fn is_primary(self) -> bool {
        self == EndpointRole::Primary
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointRole::Primary => "primary",
            EndpointRole::Secondary => "secondary",
        }
    }
}

impl From<u8> for EndpointRole {
    fn from(value: u8) -> Self {
        match value {
            1 => EndpointRole::Secondary,
            _ => EndpointRole::Primary,
        }
    }
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single bounded-time reachability check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeOutcome {
    /// 2xx response
    Reachable,
    /// 401 response: the network path works, the session does not
    AuthExpired,
    /// Transport error, timeout, or any other status
    Unreachable,
}

impl ProbeOutcome {
    /// Whether the network path to the endpoint works
    pub fn is_network_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable | ProbeOutcome::AuthExpired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Reachable => "reachable",
            ProbeOutcome::AuthExpired => "auth-expired",
            ProbeOutcome::Unreachable => "unreachable",
        }
    }
}

/// Result of a full cascading health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthVerdict {
    Healthy,
    Unhealthy,
}

impl HealthVerdict {
    pub fn is_healthy(&self) -> bool {
        *self == HealthVerdict::Healthy
    }
}
