//! Read-only views of orchestrator state
//!
//! Snapshots are eventually consistent: they are copied out under the state
//! lock and may be stale by the time the caller looks at them.

use crate::core::{RecoveryPhase, RecoveryTrigger};
use crate::endpoint::EndpointSnapshot;
use serde::Serialize;
use std::time::Duration;

/// Gate decision for one `request_recovery` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A run started immediately
    Started,
    /// A deferred run was armed for the rest of the debounce window
    Scheduled { delay: Duration },
    /// Folded into an already armed run
    Coalesced,
    /// A run is in flight; request dropped
    DroppedRunning,
    /// The orchestrator has been shut down
    Stopped,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Started => "started",
            RequestOutcome::Scheduled { .. } => "scheduled",
            RequestOutcome::Coalesced => "coalesced",
            RequestOutcome::DroppedRunning => "dropped-running",
            RequestOutcome::Stopped => "stopped",
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Both endpoints unreachable
    Unhealthy,
    /// Streaming connection was down; a reconnect was handed to the supervisor
    ReconnectLaunched,
    /// Streaming connection was down and a supervised reconnect is already running
    ReconnectInFlight,
    /// Streaming connection live (or rebuilding itself); refresh requested
    RefreshRequested,
    /// A collaborator failed or panicked
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Unhealthy => "unhealthy",
            RunOutcome::ReconnectLaunched => "reconnect-launched",
            RunOutcome::ReconnectInFlight => "reconnect-in-flight",
            RunOutcome::RefreshRequested => "refresh-requested",
            RunOutcome::Failed => "failed",
        }
    }

    pub fn is_healthy(&self) -> bool {
        !matches!(self, RunOutcome::Unhealthy | RunOutcome::Failed)
    }
}

/// Counters kept by the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryStats {
    pub requests: u64,
    pub runs_started: u64,
    pub runs_finished: u64,
    pub healthy_runs: u64,
    pub unhealthy_runs: u64,
    pub run_failures: u64,
    pub dropped_running: u64,
    pub coalesced: u64,
    pub reconnects_launched: u64,
    pub refreshes_requested: u64,
}

impl RecoveryStats {
    pub(crate) fn record_finish(&mut self, outcome: RunOutcome) {
        self.runs_finished += 1;
        match outcome {
            RunOutcome::Unhealthy => self.unhealthy_runs += 1,
            RunOutcome::Failed => self.run_failures += 1,
            RunOutcome::ReconnectLaunched => {
                self.healthy_runs += 1;
                self.reconnects_launched += 1;
            }
            RunOutcome::ReconnectInFlight => self.healthy_runs += 1,
            RunOutcome::RefreshRequested => {
                self.healthy_runs += 1;
                self.refreshes_requested += 1;
            }
        }
    }
}

/// Point-in-time view for UIs and the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryStatus {
    pub phase: RecoveryPhase,
    pub pending_trigger: Option<RecoveryTrigger>,
    pub last_run_trigger: Option<RecoveryTrigger>,
    pub last_run_outcome: Option<RunOutcome>,
    pub last_attempt_age_ms: Option<u64>,
    pub endpoint: EndpointSnapshot,
    pub stats: RecoveryStats,
}
