//! Recovery Orchestrator - single-flight, debounced connection recovery
//!
//! Every trigger (online, wake from sleep, focus, realtime disconnect) funnels
//! into [`RecoveryOrchestrator::request_recovery`]. The orchestrator guarantees:
//!
//! 1. **Single flight**: at most one run at any instant. Requests arriving
//!    while a run is in flight are dropped, not queued.
//! 2. **Debounce**: consecutive runs start at least one window after the
//!    previous run *ended*. The attempt time is stamped at run start and again
//!    at run end, so a 20 s cascade followed by a request does not start a new
//!    run immediately.
//! 3. **Deferral**: a request inside the window arms one timer for the rest of
//!    the window. Further requests coalesce into it; the most recent trigger
//!    label wins but the deadline does not move.
//! 4. **Guaranteed cleanup**: the phase returns to Idle when a run finishes,
//!    including when a collaborator panics.
//! 5. **Teardown**: `cancel` leaves an in-flight run to finish on its own;
//!    `shutdown` abandons it at its next await point, mid-backoff included.
//!
//! ## Run body
//!
//! ```text
//! check() ── Unhealthy ──> log, stop (next trigger retries)
//!    │
//!  Healthy
//!    │
//!    ├── stream down and not reconnecting ──> launch reconnect (fire and forget)
//!    └── otherwise ──────────────────────────> publish dataRefreshRequested
//! ```

use super::status::{RecoveryStats, RecoveryStatus, RequestOutcome, RunOutcome};
use crate::config::RecoveryConfig;
use crate::core::{admit, Admission, RecoveryError, RecoveryPhase, RecoveryTrigger};
use crate::endpoint::EndpointRegistry;
use crate::events::{EventBus, RecoveryEvent};
use crate::health::CascadingHealthChecker;
use crate::monitoring::{RecoveryMetrics, StatusProvider};
use crate::streaming::{LaunchOutcome, ReconnectSupervisor, StreamingConnection};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// The armed deferred run
struct PendingRun {
    id: u64,
    trigger: RecoveryTrigger,
    deadline: Instant,
    timer: JoinHandle<()>,
}

struct RecoveryState {
    phase: RecoveryPhase,
    last_attempt_at: Option<Instant>,
    pending: Option<PendingRun>,
    next_pending_id: u64,
    /// Identifies the current run; a run only resets state it still owns
    run_id: u64,
    last_run_trigger: Option<RecoveryTrigger>,
    last_run_outcome: Option<RunOutcome>,
    stopped: bool,
    stats: RecoveryStats,
}

impl RecoveryState {
    fn new() -> Self {
        Self {
            phase: RecoveryPhase::Idle,
            last_attempt_at: None,
            pending: None,
            next_pending_id: 0,
            run_id: 0,
            last_run_trigger: None,
            last_run_outcome: None,
            stopped: false,
            stats: RecoveryStats::default(),
        }
    }

    fn disarm(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }
}

struct Inner {
    debounce_window: Duration,
    checker: CascadingHealthChecker,
    stream: Arc<dyn StreamingConnection>,
    supervisor: ReconnectSupervisor,
    bus: EventBus,
    metrics: Option<Arc<RecoveryMetrics>>,
    runtime: Handle,
    state: Mutex<RecoveryState>,
    phase_tx: watch::Sender<RecoveryPhase>,
    shutdown_tx: watch::Sender<bool>,
}

/// Builder for [`RecoveryOrchestrator`]
pub struct OrchestratorBuilder {
    config: RecoveryConfig,
    checker: CascadingHealthChecker,
    stream: Arc<dyn StreamingConnection>,
    bus: EventBus,
    metrics: Option<Arc<RecoveryMetrics>>,
    runtime: Option<Handle>,
}

impl OrchestratorBuilder {
    pub fn metrics(mut self, metrics: Arc<RecoveryMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawn runs and timers on `runtime` instead of the ambient one
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<RecoveryOrchestrator, RecoveryError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| RecoveryError::NoRuntime(e.to_string()))?,
        };

        let supervisor =
            ReconnectSupervisor::new(Arc::clone(&self.stream), self.bus.clone(), runtime.clone());
        let (phase_tx, _) = watch::channel(RecoveryPhase::Idle);
        let (shutdown_tx, _) = watch::channel(false);

        info!(
            debounce_window = ?self.config.debounce_window(),
            worst_case_check = ?self.checker.worst_case_latency(),
            "Recovery orchestrator ready"
        );

        Ok(RecoveryOrchestrator {
            inner: Arc::new(Inner {
                debounce_window: self.config.debounce_window(),
                checker: self.checker,
                stream: self.stream,
                supervisor,
                bus: self.bus,
                metrics: self.metrics,
                runtime,
                state: Mutex::new(RecoveryState::new()),
                phase_tx,
                shutdown_tx,
            }),
        })
    }
}

/// Cheaply cloneable handle; all clones share one gate
#[derive(Clone)]
pub struct RecoveryOrchestrator {
    inner: Arc<Inner>,
}

impl RecoveryOrchestrator {
    /// Create an orchestrator on the ambient tokio runtime
    pub fn new(
        config: RecoveryConfig,
        checker: CascadingHealthChecker,
        stream: Arc<dyn StreamingConnection>,
        bus: EventBus,
    ) -> Result<Self, RecoveryError> {
        Self::builder(config, checker, stream, bus).build()
    }

    pub fn builder(
        config: RecoveryConfig,
        checker: CascadingHealthChecker,
        stream: Arc<dyn StreamingConnection>,
        bus: EventBus,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            checker,
            stream,
            bus,
            metrics: None,
            runtime: None,
        }
    }

    /// Ask for a recovery run. Never blocks and never fails.
    ///
    /// Safe to call from any thread, at any rate, including from event
    /// handlers running inside a recovery run.
    pub fn request_recovery(&self, trigger: RecoveryTrigger) -> RequestOutcome {
        let outcome = self.inner.request(trigger);
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_request(trigger, outcome.as_str());
        }
        outcome
    }

    /// Disarm any pending timer and force the phase back to Idle.
    ///
    /// A run already in flight is not interrupted. When it finishes it still
    /// stamps the attempt time but leaves the phase alone. Intended for teardown.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        let disarmed = state.disarm();
        let was = state.phase;
        state.phase.reset();
        // Orphan the in-flight run, if any
        state.run_id += 1;
        self.inner.publish_phase(state.phase);
        drop(state);

        info!(was = was.state_name(), disarmed, "Recovery cancelled");
    }

    /// Cancel, abandon the in-flight run, abort any supervised reconnect and
    /// refuse further requests
    pub fn shutdown(&self) {
        self.inner.state.lock().stopped = true;
        self.cancel();
        self.inner.shutdown_tx.send_replace(true);
        self.inner.supervisor.shutdown();
        info!("Recovery orchestrator shut down");
    }

    pub fn is_recovering(&self) -> bool {
        self.inner.state.lock().phase.is_running()
    }

    pub fn phase(&self) -> RecoveryPhase {
        self.inner.state.lock().phase
    }

    /// Receiver that observes every phase transition
    pub fn watch_phase(&self) -> watch::Receiver<RecoveryPhase> {
        self.inner.phase_tx.subscribe()
    }

    /// Wait until no run is scheduled or in flight
    pub async fn wait_idle(&self) {
        let mut rx = self.watch_phase();
        // Sender lives in `inner`, which we hold, so this cannot fail
        let _ = rx.wait_for(|phase| phase.is_idle()).await;
    }

    pub fn last_attempt_at(&self) -> Option<Instant> {
        self.inner.state.lock().last_attempt_at
    }

    pub fn stats(&self) -> RecoveryStats {
        self.inner.state.lock().stats.clone()
    }

    pub fn snapshot(&self) -> RecoveryStatus {
        let state = self.inner.state.lock();
        RecoveryStatus {
            phase: state.phase,
            pending_trigger: state.pending.as_ref().map(|p| p.trigger),
            last_run_trigger: state.last_run_trigger,
            last_run_outcome: state.last_run_outcome,
            last_attempt_age_ms: state
                .last_attempt_at
                .map(|at| at.elapsed().as_millis() as u64),
            endpoint: self.inner.checker.registry().snapshot(),
            stats: state.stats.clone(),
        }
    }

    /// Time until the armed run fires, if one is armed
    pub fn pending_delay(&self) -> Option<Duration> {
        self.inner
            .state
            .lock()
            .pending
            .as_ref()
            .map(|p| p.deadline.saturating_duration_since(Instant::now()))
    }

    pub fn debounce_window(&self) -> Duration {
        self.inner.debounce_window
    }

    /// Upper bound on one run's health check
    pub fn worst_case_latency(&self) -> Duration {
        self.inner.checker.worst_case_latency()
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        self.inner.checker.registry()
    }

    pub fn supervisor(&self) -> &ReconnectSupervisor {
        &self.inner.supervisor
    }
}

impl StatusProvider for RecoveryOrchestrator {
    fn status(&self) -> RecoveryStatus {
        self.snapshot()
    }
}

impl Inner {
    fn publish_phase(&self, phase: RecoveryPhase) {
        self.phase_tx.send_replace(phase);
    }

    fn request(self: &Arc<Self>, trigger: RecoveryTrigger) -> RequestOutcome {
        let now = Instant::now();
        let mut state = self.state.lock();

        if state.stopped {
            debug!(trigger = %trigger, "Recovery requested after shutdown, ignoring");
            return RequestOutcome::Stopped;
        }

        state.stats.requests += 1;
        let since_last = state
            .last_attempt_at
            .map(|at| now.saturating_duration_since(at));

        let mut run = None;
        let outcome = match admit(state.phase, since_last, self.debounce_window) {
            Admission::DropRunning => {
                state.stats.dropped_running += 1;
                debug!(trigger = %trigger, "Recovery already running, request dropped");
                RequestOutcome::DroppedRunning
            }
            Admission::Coalesce => {
                if let Some(pending) = state.pending.as_mut() {
                    pending.trigger = trigger;
                }
                state.stats.coalesced += 1;
                debug!(trigger = %trigger, "Recovery already scheduled, request coalesced");
                RequestOutcome::Coalesced
            }
            Admission::Schedule { delay } => {
                self.arm(&mut state, trigger, now + delay);
                debug!(trigger = %trigger, ?delay, "Inside debounce window, recovery scheduled");
                RequestOutcome::Scheduled { delay }
            }
            Admission::RunNow => {
                // A stale timer from an earlier window may still be armed
                state.disarm();
                run = self.begin_run(&mut state, trigger, now);
                RequestOutcome::Started
            }
        };
        drop(state);

        if let Some(guard) = run {
            self.runtime.spawn(run_recovery(guard));
        }
        outcome
    }

    fn arm(self: &Arc<Self>, state: &mut RecoveryState, trigger: RecoveryTrigger, deadline: Instant) {
        if !state.phase.schedule() {
            return;
        }

        state.next_pending_id += 1;
        let id = state.next_pending_id;
        let inner = Arc::clone(self);
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            inner.fire(id);
        });

        state.pending = Some(PendingRun {
            id,
            trigger,
            deadline,
            timer,
        });
        self.publish_phase(state.phase);
    }

    fn fire(self: &Arc<Self>, id: u64) {
        let mut state = self.state.lock();

        // Disarmed or replaced while we were waking up
        if state.pending.as_ref().map(|p| p.id) != Some(id) {
            return;
        }
        let Some(pending) = state.pending.take() else {
            return;
        };

        if state.stopped || state.phase.is_running() {
            debug!(trigger = %pending.trigger, "Scheduled recovery skipped, run already in flight");
            return;
        }

        debug!(trigger = %pending.trigger, "Debounce window elapsed, running scheduled recovery");
        let run = self.begin_run(&mut state, pending.trigger, Instant::now());
        drop(state);

        if let Some(guard) = run {
            self.runtime.spawn(run_recovery(guard));
        }
    }

    /// Enter Running under the state lock. The returned guard must be spawned
    /// after the lock is released.
    fn begin_run(
        self: &Arc<Self>,
        state: &mut RecoveryState,
        trigger: RecoveryTrigger,
        now: Instant,
    ) -> Option<RunGuard> {
        if !state.phase.begin_run() {
            return None;
        }

        state.run_id += 1;
        state.last_attempt_at = Some(now);
        state.last_run_trigger = Some(trigger);
        state.stats.runs_started += 1;
        self.publish_phase(state.phase);

        Some(RunGuard {
            inner: Arc::clone(self),
            run_id: state.run_id,
            trigger,
            started: now,
            outcome: RunOutcome::Failed,
        })
    }

    async fn execute(&self, trigger: RecoveryTrigger) -> Result<RunOutcome, RecoveryError> {
        if !self.checker.check().await.is_healthy() {
            warn!(trigger = %trigger, "Backend unreachable, waiting for next trigger");
            return Ok(RunOutcome::Unhealthy);
        }

        if !self.stream.is_connected() && !self.stream.is_reconnecting() {
            info!(trigger = %trigger, "Backend healthy but stream down, reconnecting");
            return match self.supervisor.launch(trigger)? {
                LaunchOutcome::Launched => Ok(RunOutcome::ReconnectLaunched),
                LaunchOutcome::AlreadyRunning => Ok(RunOutcome::ReconnectInFlight),
            };
        }

        debug!(trigger = %trigger, "Backend healthy, requesting data refresh");
        self.bus.publish(RecoveryEvent::DataRefreshRequested {
            trigger: Some(trigger),
        });
        Ok(RunOutcome::RefreshRequested)
    }
}

async fn run_recovery(mut guard: RunGuard) {
    let trigger = guard.trigger;
    let inner = Arc::clone(&guard.inner);
    let mut shutdown = inner.shutdown_tx.subscribe();
    info!(trigger = %trigger, "Recovery run started");

    // Dropping the run future releases its probe and backoff timers
    tokio::select! {
        biased;
        _ = shutdown.wait_for(|stopped| *stopped) => {
            info!(trigger = %trigger, "Recovery run abandoned at shutdown");
        }
        result = inner.execute(trigger) => match result {
            Ok(outcome) => guard.outcome = outcome,
            Err(e) => error!(trigger = %trigger, error = %e, "Recovery run failed"),
        },
    }
}

/// Finishes a run on every exit path, unwinding included
struct RunGuard {
    inner: Arc<Inner>,
    run_id: u64,
    trigger: RecoveryTrigger,
    started: Instant,
    outcome: RunOutcome,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let now = Instant::now();
        let mut state = self.inner.state.lock();

        // End-of-run stamp holds for orphaned runs too
        state.last_attempt_at = Some(state.last_attempt_at.map_or(now, |at| at.max(now)));

        if state.run_id != self.run_id {
            debug!(outcome = self.outcome.as_str(), "Orphaned recovery run finished");
            return;
        }

        state.last_run_outcome = Some(self.outcome);
        state.stats.record_finish(self.outcome);
        state.phase.finish_run();
        self.inner.publish_phase(state.phase);
        drop(state);

        if let Some(metrics) = &self.inner.metrics {
            metrics.record_run(self.outcome.as_str(), elapsed);
        }
        info!(
            trigger = %self.trigger,
            outcome = self.outcome.as_str(),
            ?elapsed,
            "Recovery run finished"
        );
    }
}
