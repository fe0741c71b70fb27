//! Recovery Phase State Machine
//!
//! Pure, clock-free model of the orchestrator gate. The orchestrator owns one
//! `RecoveryPhase` behind its state lock and consults [`admit`] for every
//! incoming request; all timing is passed in as durations so the decision is
//! unit-testable without timers.
//!
//! # State Diagram
//!
//! ```text
//!                 request (window elapsed)
//!        ┌──────────────────────────────────────────┐
//!        │                                          ▼
//!      IDLE ──request (inside window)──→ SCHEDULED ──timer fires──→ RUNNING
//!        ▲                                  │   ▲                      │
//!        │                               cancel │ request: coalesce    │
//!        ├──────────────────────────────────┘   └──────┘               │
//!        │                                                             │
//!        └───────────────────── run finished / cancel ─────────────────┘
//! ```
//!
//! Idle and Scheduled accept requests. Running drops them.

use std::time::Duration;

/// Logical state of the orchestrator gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPhase {
    /// Nothing pending, nothing running
    #[default]
    Idle,
    /// A debounced run is armed
    Scheduled,
    /// A run is in flight
    Running,
}

/// Decision for one incoming recovery request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Debounce window has elapsed: start a run now
    RunNow,
    /// Arm a one-shot timer for the remainder of the window
    Schedule { delay: Duration },
    /// A timer is already armed: fold into it
    Coalesce,
    /// A run is in flight: drop
    DropRunning,
}

/// Decide what to do with a request.
///
/// `since_last` is the time since the last start-or-finish stamp, `None` if no
/// run has ever happened.
pub fn admit(phase: RecoveryPhase, since_last: Option<Duration>, window: Duration) -> Admission {
    if phase == RecoveryPhase::Running {
        return Admission::DropRunning;
    }

    let elapsed = match since_last {
        None => return Admission::RunNow,
        Some(elapsed) => elapsed,
    };

    if elapsed >= window {
        // Also covers a Scheduled phase whose timer is late; the caller
        // disarms the timer before starting.
        return Admission::RunNow;
    }

    if phase == RecoveryPhase::Scheduled {
        return Admission::Coalesce;
    }

    Admission::Schedule {
        delay: window - elapsed,
    }
}

impl RecoveryPhase {
    /// Whether new requests are considered at all
    pub fn accepts_requests(&self) -> bool {
        !matches!(self, RecoveryPhase::Running)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RecoveryPhase::Running)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, RecoveryPhase::Idle)
    }

    /// Transition: Idle | Scheduled → Running.
    ///
    /// Returns false (and leaves the phase untouched) if a run is already in
    /// flight. This is the single-flight guard.
    pub fn begin_run(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        *self = RecoveryPhase::Running;
        true
    }

    /// Transition: Idle → Scheduled
    pub fn schedule(&mut self) -> bool {
        if *self != RecoveryPhase::Idle {
            return false;
        }
        *self = RecoveryPhase::Scheduled;
        true
    }

    /// Transition: Running → Idle
    pub fn finish_run(&mut self) {
        if self.is_running() {
            *self = RecoveryPhase::Idle;
        }
    }

    /// Forced transition back to Idle from any state
    pub fn reset(&mut self) {
        *self = RecoveryPhase::Idle;
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            RecoveryPhase::Idle => "Idle",
            RecoveryPhase::Scheduled => "Scheduled",
            RecoveryPhase::Running => "Running",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(5);

    #[test]
    fn test_first_request_runs_immediately() {
        assert_eq!(admit(RecoveryPhase::Idle, None, WINDOW), Admission::RunNow);
    }

    #[test]
    fn test_request_after_window_runs_immediately() {
        let decision = admit(RecoveryPhase::Idle, Some(Duration::from_secs(5)), WINDOW);
        assert_eq!(decision, Admission::RunNow);
    }

    #[test]
    fn test_request_inside_window_is_scheduled_for_remainder() {
        let decision = admit(RecoveryPhase::Idle, Some(Duration::from_secs(2)), WINDOW);
        assert_eq!(
            decision,
            Admission::Schedule {
                delay: Duration::from_secs(3)
            }
        );
    }

    #[test]
    fn test_request_while_scheduled_is_coalesced() {
        let decision = admit(RecoveryPhase::Scheduled, Some(Duration::from_secs(1)), WINDOW);
        assert_eq!(decision, Admission::Coalesce);
    }

    #[test]
    fn test_request_while_running_is_dropped() {
        assert_eq!(admit(RecoveryPhase::Running, None, WINDOW), Admission::DropRunning);
        assert_eq!(
            admit(RecoveryPhase::Running, Some(Duration::from_secs(60)), WINDOW),
            Admission::DropRunning
        );
    }

    #[test]
    fn test_begin_run_is_single_flight() {
        let mut phase = RecoveryPhase::Idle;
        assert!(phase.begin_run());
        assert!(!phase.begin_run());
        assert_eq!(phase, RecoveryPhase::Running);

        phase.finish_run();
        assert!(phase.is_idle());
    }

    #[test]
    fn test_schedule_only_from_idle() {
        let mut phase = RecoveryPhase::Idle;
        assert!(phase.schedule());
        assert!(!phase.schedule());
        assert!(phase.begin_run());
        assert!(!phase.schedule());
    }

    #[test]
    fn test_finish_run_ignores_non_running() {
        let mut phase = RecoveryPhase::Scheduled;
        phase.finish_run();
        assert_eq!(phase, RecoveryPhase::Scheduled);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(RecoveryPhase::Idle.state_name(), "Idle");
        assert_eq!(RecoveryPhase::Running.state_name(), "Running");
        assert!(!RecoveryPhase::Running.accepts_requests());
        assert!(RecoveryPhase::Scheduled.accepts_requests());
    }
}
