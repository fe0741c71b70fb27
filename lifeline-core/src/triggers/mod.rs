//! Trigger sources that feed the recovery orchestrator
//!
//! - `sleep`: wall-clock jump detection (machine slept)
//! - `connectivity`: offline→online edge detection
//!
//! Focus and realtime-disconnect triggers come from the embedding application
//! calling `request_recovery` directly.

pub mod connectivity;
pub mod sleep;

pub use connectivity::ConnectivityMonitor;
pub use sleep::{ClockObservation, SleepDetector};

use crate::core::RecoveryTrigger;
use crate::recovery::RecoveryOrchestrator;
use tokio::sync::mpsc;

/// Destination for detected triggers
pub trait TriggerSink: Send + Sync + 'static {
    fn trigger(&self, trigger: RecoveryTrigger);
}

impl TriggerSink for RecoveryOrchestrator {
    fn trigger(&self, trigger: RecoveryTrigger) {
        self.request_recovery(trigger);
    }
}

impl TriggerSink for mpsc::UnboundedSender<RecoveryTrigger> {
    fn trigger(&self, trigger: RecoveryTrigger) {
        // Receiver gone means nobody is listening any more
        let _ = self.send(trigger);
    }
}
