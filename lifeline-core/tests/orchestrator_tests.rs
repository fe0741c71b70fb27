//! Recovery orchestrator gate properties
//!
//! These tests verify:
//! 1. Single flight: requests during a run are dropped, from any thread
//! 2. Debounce monotonicity: the next run starts a full window after the
//!    previous run *ended*, even after a slow cascade
//! 3. Coalescing: one timer per window, most recent trigger wins
//! 4. Cancel and shutdown disarm timers; orphaned runs do not clobber the
//!    phase but still stamp their end; shutdown abandons a run mid-backoff
//! 5. A panicking collaborator still returns the gate to Idle

use async_trait::async_trait;
use lifeline_core::config::RecoveryConfig;
use lifeline_core::core::{ProbeError, RecoveryPhase, RecoveryTrigger};
use lifeline_core::events::{EventBus, EventKind, RecoveryEvent};
use lifeline_core::health::{CascadingHealthChecker, HealthProbe, HealthTransport};
use lifeline_core::recovery::{RecoveryOrchestrator, RequestOutcome, RunOutcome};
use lifeline_core::testing::{
    test_checker, test_registry, EventLog, MockStream, MockTransport, ScriptedResponse,
    PRIMARY_URL, SECONDARY_URL,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(5);

fn orchestrator(transport: Arc<MockTransport>, bus: EventBus) -> RecoveryOrchestrator {
    let checker = test_checker(transport, test_registry(), bus.clone());
    RecoveryOrchestrator::new(
        RecoveryConfig::default(),
        checker,
        Arc::new(MockStream::connected()),
        bus,
    )
    .unwrap()
}

fn healthy_transport() -> Arc<MockTransport> {
    let transport = Arc::new(MockTransport::new());
    transport.always(PRIMARY_URL, ScriptedResponse::Status(200));
    transport
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_drops_requests_while_running() {
    let transport = Arc::new(MockTransport::new());
    transport.always(PRIMARY_URL, ScriptedResponse::Delayed(Duration::from_secs(3), 200));
    let orch = orchestrator(transport.clone(), EventBus::new());

    assert_eq!(orch.request_recovery(RecoveryTrigger::Online), RequestOutcome::Started);
    for trigger in RecoveryTrigger::ALL.into_iter().cycle().take(20) {
        assert_eq!(orch.request_recovery(trigger), RequestOutcome::DroppedRunning);
    }

    // Still dropping halfway through the run
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(orch.is_recovering());
    assert_eq!(
        orch.request_recovery(RecoveryTrigger::Focus),
        RequestOutcome::DroppedRunning
    );

    orch.wait_idle().await;
    let stats = orch.stats();
    assert_eq!(stats.runs_started, 1);
    assert_eq!(stats.dropped_running, 21);
    assert_eq!(transport.calls().len(), 1);
    assert!(orch.pending_delay().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_debounce_counts_from_end_of_slow_run() {
    let transport = Arc::new(MockTransport::new());
    transport.always(PRIMARY_URL, ScriptedResponse::Hang);
    transport.always(SECONDARY_URL, ScriptedResponse::Hang);
    let orch = orchestrator(transport.clone(), EventBus::new());

    let first_start = Instant::now();
    orch.request_recovery(RecoveryTrigger::Sleep);
    orch.wait_idle().await;
    let first_end = Instant::now();
    assert_eq!(first_end - first_start, Duration::from_millis(24_500));
    assert_eq!(orch.last_attempt_at(), Some(first_end));

    // Far past the start stamp, but inside the window after the end stamp
    assert_eq!(
        orch.request_recovery(RecoveryTrigger::Focus),
        RequestOutcome::Scheduled { delay: WINDOW }
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(orch.request_recovery(RecoveryTrigger::Online), RequestOutcome::Coalesced);
    assert_eq!(orch.pending_delay(), Some(Duration::from_secs(3)));

    orch.wait_idle().await;

    // Second run's first probe is exactly one window after the first run ended
    let calls = transport.calls();
    assert_eq!(calls.len(), 8);
    assert_eq!(calls[4].at - first_end, WINDOW);
    assert_eq!(orch.stats().runs_started, 2);
}

#[tokio::test(start_paused = true)]
async fn test_no_run_starts_inside_window_regardless_of_trigger_volume() {
    let transport = healthy_transport();
    let orch = orchestrator(transport.clone(), EventBus::new());

    orch.request_recovery(RecoveryTrigger::Online);
    orch.wait_idle().await;
    let first_end = Instant::now();

    // A request every 100 ms for 4.9 s
    let mut outcomes = Vec::new();
    for _ in 0..49 {
        outcomes.push(orch.request_recovery(RecoveryTrigger::Focus));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(outcomes[0], RequestOutcome::Scheduled { delay: WINDOW });
    assert!(outcomes[1..].iter().all(|o| *o == RequestOutcome::Coalesced));

    orch.wait_idle().await;
    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].at - first_end, WINDOW);
}

#[tokio::test(start_paused = true)]
async fn test_coalesced_trigger_label_last_write_wins() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let orch = orchestrator(healthy_transport(), bus);

    orch.request_recovery(RecoveryTrigger::Online);
    orch.wait_idle().await;

    assert!(matches!(
        orch.request_recovery(RecoveryTrigger::Online),
        RequestOutcome::Scheduled { .. }
    ));
    assert_eq!(orch.request_recovery(RecoveryTrigger::Sleep), RequestOutcome::Coalesced);
    assert_eq!(orch.request_recovery(RecoveryTrigger::Focus), RequestOutcome::Coalesced);

    let status = orch.snapshot();
    assert_eq!(status.phase, RecoveryPhase::Scheduled);
    assert_eq!(status.pending_trigger, Some(RecoveryTrigger::Focus));

    orch.wait_idle().await;

    let status = orch.snapshot();
    assert_eq!(status.last_run_trigger, Some(RecoveryTrigger::Focus));
    assert_eq!(status.stats.coalesced, 2);
    assert_eq!(
        log.events().last(),
        Some(&RecoveryEvent::DataRefreshRequested {
            trigger: Some(RecoveryTrigger::Focus)
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_phase_transitions_are_observable() {
    let orch = orchestrator(healthy_transport(), EventBus::new());
    let mut rx = orch.watch_phase();
    assert_eq!(*rx.borrow(), RecoveryPhase::Idle);

    orch.request_recovery(RecoveryTrigger::Online);
    assert_eq!(*rx.borrow_and_update(), RecoveryPhase::Running);

    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), RecoveryPhase::Idle);

    orch.request_recovery(RecoveryTrigger::Online);
    assert_eq!(*rx.borrow_and_update(), RecoveryPhase::Scheduled);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_disarms_pending_timer() {
    let transport = healthy_transport();
    let orch = orchestrator(transport.clone(), EventBus::new());

    orch.request_recovery(RecoveryTrigger::Online);
    orch.wait_idle().await;
    orch.request_recovery(RecoveryTrigger::Focus);
    assert_eq!(orch.phase(), RecoveryPhase::Scheduled);

    orch.cancel();
    assert_eq!(orch.phase(), RecoveryPhase::Idle);
    assert!(orch.pending_delay().is_none());

    tokio::time::sleep(WINDOW * 3).await;
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(orch.stats().runs_started, 1);

    // Still usable after cancel
    assert_eq!(orch.request_recovery(RecoveryTrigger::Focus), RequestOutcome::Started);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_orphans_running_run() {
    let transport = Arc::new(MockTransport::new());
    transport.always(PRIMARY_URL, ScriptedResponse::Delayed(Duration::from_secs(3), 200));
    let orch = orchestrator(transport.clone(), EventBus::new());
    let started = Instant::now();

    orch.request_recovery(RecoveryTrigger::Online);
    orch.cancel();
    assert!(!orch.is_recovering());

    // Start stamp still applies
    assert_eq!(
        orch.request_recovery(RecoveryTrigger::Focus),
        RequestOutcome::Scheduled { delay: WINDOW }
    );

    // The orphaned run finishes at 3 s: end stamp applies, scheduled phase kept
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(orch.phase(), RecoveryPhase::Scheduled);
    assert_eq!(orch.last_attempt_at(), Some(started + Duration::from_secs(3)));

    orch.wait_idle().await;
    assert_eq!(transport.calls().len(), 2);
    assert_eq!(orch.stats().runs_started, 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_rejects_requests_and_disarms() {
    let transport = healthy_transport();
    let orch = orchestrator(transport.clone(), EventBus::new());

    orch.request_recovery(RecoveryTrigger::Online);
    orch.wait_idle().await;
    orch.request_recovery(RecoveryTrigger::Focus);

    orch.shutdown();
    assert_eq!(orch.request_recovery(RecoveryTrigger::Sleep), RequestOutcome::Stopped);

    tokio::time::sleep(WINDOW * 2).await;
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(orch.phase(), RecoveryPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_orphaned_slow_run_still_enforces_window() {
    let transport = Arc::new(MockTransport::new());
    transport.always(PRIMARY_URL, ScriptedResponse::Hang);
    transport.always(SECONDARY_URL, ScriptedResponse::Hang);
    let orch = orchestrator(transport.clone(), EventBus::new());

    orch.request_recovery(RecoveryTrigger::Sleep);
    tokio::time::sleep(Duration::from_millis(10)).await;
    orch.cancel();

    // Orphaned cascade runs to its 24.5 s bound
    tokio::time::sleep(Duration::from_millis(24_590)).await;
    assert_eq!(transport.calls().len(), 4);

    assert_eq!(
        orch.request_recovery(RecoveryTrigger::Focus),
        RequestOutcome::Scheduled {
            delay: Duration::from_millis(4_900)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_abandons_run_mid_backoff() {
    let transport = Arc::new(MockTransport::new());
    transport.always(PRIMARY_URL, ScriptedResponse::Status(503));
    transport.always(SECONDARY_URL, ScriptedResponse::Status(200));
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let orch = orchestrator(transport.clone(), bus);

    orch.request_recovery(RecoveryTrigger::Online);
    // First attempt failed, run is sleeping off the 1.5 s backoff
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.calls().len(), 1);

    orch.shutdown();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(transport.calls().len(), 1);
    assert!(orch.registry().is_primary_active());
    assert!(log.is_empty());
    assert_eq!(orch.phase(), RecoveryPhase::Idle);
    assert_eq!(orch.stats().runs_finished, 0);
}

#[tokio::test(start_paused = true)]
async fn test_handler_reentry_during_run_is_dropped() {
    let bus = EventBus::new();
    let orch = orchestrator(healthy_transport(), bus.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handler_orch = orch.clone();
    let handler_seen = seen.clone();
    let _sub = bus.subscribe(EventKind::DataRefreshRequested, move |_| {
        handler_seen
            .lock()
            .push(handler_orch.request_recovery(RecoveryTrigger::Focus));
    });

    orch.request_recovery(RecoveryTrigger::Online);
    orch.wait_idle().await;

    assert_eq!(*seen.lock(), vec![RequestOutcome::DroppedRunning]);
    assert_eq!(orch.phase(), RecoveryPhase::Idle);
}

struct PanickingTransport;

#[async_trait]
impl HealthTransport for PanickingTransport {
    async fn get_status(&self, _url: &str) -> Result<u16, ProbeError> {
        panic!("transport exploded");
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicking_collaborator_still_returns_to_idle() {
    let bus = EventBus::new();
    let probe = HealthProbe::new(Arc::new(PanickingTransport), bus.clone());
    let checker = CascadingHealthChecker::new(probe, test_registry(), bus.clone(), Default::default());
    let orch = RecoveryOrchestrator::new(
        RecoveryConfig::default(),
        checker,
        Arc::new(MockStream::connected()),
        bus,
    )
    .unwrap();

    orch.request_recovery(RecoveryTrigger::Online);
    orch.wait_idle().await;

    let status = orch.snapshot();
    assert_eq!(status.phase, RecoveryPhase::Idle);
    assert_eq!(status.last_run_outcome, Some(RunOutcome::Failed));
    assert_eq!(status.stats.run_failures, 1);
    assert!(status.last_attempt_age_ms.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_under_thread_contention() {
    let orch = orchestrator(healthy_transport(), EventBus::new());

    let outcomes: Vec<RequestOutcome> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let orch = orch.clone();
                scope.spawn(move || {
                    (0..100)
                        .map(|i| orch.request_recovery(RecoveryTrigger::ALL[i % 4]))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect()
    });

    let started = outcomes.iter().filter(|o| **o == RequestOutcome::Started).count();
    let scheduled = outcomes
        .iter()
        .filter(|o| matches!(o, RequestOutcome::Scheduled { .. }))
        .count();

    assert_eq!(outcomes.len(), 800);
    assert_eq!(started, 1);
    assert!(scheduled <= 1);
    assert_eq!(orch.stats().requests, 800);

    orch.shutdown();
}
