//! Online/offline edge detection
//!
//! Platforms report network reachability changes noisily: the same "online"
//! state can be announced several times in a row. Only an offline→online edge
//! is worth a recovery run.

use super::TriggerSink;
use crate::core::RecoveryTrigger;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ConnectivityMonitor {
    online: AtomicBool,
    sink: Arc<dyn TriggerSink>,
    transitions: AtomicU64,
}

impl ConnectivityMonitor {
    pub fn new(sink: Arc<dyn TriggerSink>, initially_online: bool) -> Self {
        Self {
            online: AtomicBool::new(initially_online),
            sink,
            transitions: AtomicU64::new(0),
        }
    }

    /// Record the platform's current reachability.
    ///
    /// Returns true if this report fired an `Online` trigger.
    pub fn report(&self, online: bool) -> bool {
        let was_online = self.online.swap(online, Ordering::AcqRel);
        if was_online == online {
            debug!(online, "Connectivity unchanged");
            return false;
        }

        self.transitions.fetch_add(1, Ordering::Relaxed);
        if online {
            info!("Network back online, requesting recovery");
            self.sink.trigger(RecoveryTrigger::Online);
            true
        } else {
            info!("Network went offline");
            false
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Number of state changes seen so far
    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn monitor(initially_online: bool) -> (ConnectivityMonitor, mpsc::UnboundedReceiver<RecoveryTrigger>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectivityMonitor::new(Arc::new(tx), initially_online), rx)
    }

    #[test]
    fn test_only_offline_to_online_fires() {
        let (monitor, mut rx) = monitor(true);

        assert!(!monitor.report(true));
        assert!(!monitor.report(false));
        assert!(!monitor.is_online());
        assert!(monitor.report(true));
        assert!(!monitor.report(true));

        assert_eq!(rx.try_recv(), Ok(RecoveryTrigger::Online));
        assert!(rx.try_recv().is_err());
        assert_eq!(monitor.transitions(), 2);
    }

    #[test]
    fn test_starting_offline() {
        let (monitor, mut rx) = monitor(false);

        assert!(!monitor.report(false));
        assert!(monitor.report(true));
        assert_eq!(rx.try_recv(), Ok(RecoveryTrigger::Online));
    }
}
