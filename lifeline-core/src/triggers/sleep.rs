//! Sleep Detector - notices the machine was suspended
//!
//! The monotonic clock stops while the machine sleeps; the wall clock does not.
//! Every tick compares how far each clock moved since the previous tick. When
//! the wall clock got ahead of the monotonic clock by more than the threshold,
//! the difference is time spent asleep and a `Sleep` trigger fires.
//!
//! A wall clock that moves backwards (NTP step, manual change) re-baselines
//! without firing.

use super::TriggerSink;
use crate::config::TriggerConfig;
use crate::core::{RecoveryError, RecoveryTrigger};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// What one tick saw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockObservation {
    /// First tick, nothing to compare against yet
    Baseline,
    /// Clocks moved together
    Steady,
    /// Wall clock got ahead by `gap`
    Slept { gap: Duration },
    /// Wall clock moved backwards by `by`
    WentBackwards { by: Duration },
}

#[derive(Debug, Clone)]
pub struct SleepDetector {
    tick: Duration,
    threshold: Duration,
    last: Option<(SystemTime, Instant)>,
    sleeps_detected: u64,
}

impl SleepDetector {
    pub fn new(tick: Duration, threshold: Duration) -> Self {
        Self {
            tick,
            threshold,
            last: None,
            sleeps_detected: 0,
        }
    }

    pub fn from_config(config: &TriggerConfig) -> Self {
        Self::new(config.sleep_tick(), config.sleep_gap_threshold())
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    pub fn sleeps_detected(&self) -> u64 {
        self.sleeps_detected
    }

    /// Compare this tick's clocks with the previous tick's
    pub fn observe(&mut self, wall: SystemTime, mono: Instant) -> ClockObservation {
        let Some((last_wall, last_mono)) = self.last.replace((wall, mono)) else {
            return ClockObservation::Baseline;
        };

        let mono_elapsed = mono.saturating_duration_since(last_mono);
        match wall.duration_since(last_wall) {
            Ok(wall_elapsed) => {
                let gap = wall_elapsed.saturating_sub(mono_elapsed);
                if gap > self.threshold {
                    self.sleeps_detected += 1;
                    ClockObservation::Slept { gap }
                } else {
                    ClockObservation::Steady
                }
            }
            Err(e) => ClockObservation::WentBackwards { by: e.duration() },
        }
    }

    /// Tick forever on the system clock, firing `Sleep` into `sink`
    pub fn spawn<S: TriggerSink>(self, sink: Arc<S>) -> Result<JoinHandle<()>, RecoveryError> {
        self.spawn_with_clock(sink, SystemTime::now)
    }

    /// As [`spawn`](Self::spawn) with an explicit wall clock
    pub fn spawn_with_clock<S, C>(
        self,
        sink: Arc<S>,
        wall_clock: C,
    ) -> Result<JoinHandle<()>, RecoveryError>
    where
        S: TriggerSink,
        C: Fn() -> SystemTime + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|e| RecoveryError::NoRuntime(e.to_string()))?;
        Ok(self.spawn_on(&runtime, sink, wall_clock))
    }

    /// Run the tick loop on `runtime`
    pub fn spawn_on<S, C>(mut self, runtime: &Handle, sink: Arc<S>, wall_clock: C) -> JoinHandle<()>
    where
        S: TriggerSink,
        C: Fn() -> SystemTime + Send + 'static,
    {
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(self.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(tick = ?self.tick, threshold = ?self.threshold, "Sleep detector started");

            loop {
                ticker.tick().await;
                match self.observe(wall_clock(), Instant::now()) {
                    ClockObservation::Slept { gap } => {
                        info!(?gap, "Wall clock jumped ahead, machine slept");
                        sink.trigger(RecoveryTrigger::Sleep);
                    }
                    ClockObservation::WentBackwards { by } => {
                        debug!(?by, "Wall clock moved backwards, re-baselining");
                    }
                    ClockObservation::Baseline | ClockObservation::Steady => {}
                }
            }
        })
    }
}
