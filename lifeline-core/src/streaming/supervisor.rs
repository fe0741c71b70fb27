//! Reconnect supervisor - fire-and-forget reconnects with a tracked task
//!
//! A recovery run must not block on the streaming layer rebuilding itself, so
//! the reconnect is handed to this supervisor as its own task. The supervisor:
//! - keeps at most one reconnect task in flight
//! - publishes `dataRefreshRequested` once the reconnect succeeds
//! - aborts the task on shutdown

use super::StreamingConnection;
use crate::core::{RecoveryError, RecoveryTrigger};
use crate::events::{EventBus, RecoveryEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Result of asking the supervisor to reconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// A new reconnect task was spawned
    Launched,
    /// A previously launched reconnect is still running
    AlreadyRunning,
}

#[derive(Debug, Default)]
struct ReconnectCounters {
    launched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

pub struct ReconnectSupervisor {
    stream: Arc<dyn StreamingConnection>,
    bus: EventBus,
    runtime: Handle,
    task: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
    counters: Arc<ReconnectCounters>,
}

impl ReconnectSupervisor {
    pub fn new(stream: Arc<dyn StreamingConnection>, bus: EventBus, runtime: Handle) -> Self {
        Self {
            stream,
            bus,
            runtime,
            task: Mutex::new(None),
            stopped: AtomicBool::new(false),
            counters: Arc::new(ReconnectCounters::default()),
        }
    }

    /// Spawn `StreamingConnection::reconnect` unless one is already running
    pub fn launch(&self, trigger: RecoveryTrigger) -> Result<LaunchOutcome, RecoveryError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(RecoveryError::SupervisorStopped);
        }

        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(LaunchOutcome::AlreadyRunning);
        }

        let stream = Arc::clone(&self.stream);
        let bus = self.bus.clone();
        let counters = Arc::clone(&self.counters);
        counters.launched.fetch_add(1, Ordering::Relaxed);

        *task = Some(self.runtime.spawn(async move {
            match stream.reconnect().await {
                Ok(()) => {
                    counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    info!(trigger = %trigger, "Streaming connection re-established");
                    bus.publish(RecoveryEvent::DataRefreshRequested {
                        trigger: Some(trigger),
                    });
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(trigger = %trigger, error = %e, "Streaming reconnect failed");
                }
            }
        }));

        Ok(LaunchOutcome::Launched)
    }

    /// Whether a reconnect task is currently in flight
    pub fn is_busy(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the in-flight reconnect task, if any
    pub async fn join(&self) {
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Reconnect task panicked");
                }
            }
        }
    }

    /// Abort any in-flight reconnect and refuse further launches
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }

    pub fn launched(&self) -> u64 {
        self.counters.launched.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.counters.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }
}
