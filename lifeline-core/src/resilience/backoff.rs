//! Exponential backoff for health-probe retries
//!
//! Delay for the n-th retry is `initial_delay × multiplier^(n−1)`, capped at
//! `max_delay`. Optional jitter spreads clients that lost connectivity at the
//! same moment (a backend restart wakes every tab at once).

use rand::Rng;
use std::time::Duration;

/// Configuration for exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for each retry (typically 2.0)
    pub multiplier: f64,
    /// Maximum number of delays handed out (None = unlimited)
    pub max_retries: Option<usize>,
    /// Randomization factor (0.0 to 1.0); 0.0 gives exact delays
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: Some(3),
            jitter_factor: 0.0,
        }
    }
}

impl BackoffConfig {
    /// Backoff between `attempts` probe attempts: one delay fewer than attempts
    pub fn between_attempts(initial_delay: Duration, multiplier: f64, attempts: u32) -> Self {
        Self {
            initial_delay,
            multiplier,
            max_retries: Some(attempts.saturating_sub(1) as usize),
            ..Default::default()
        }
    }

    /// Create a configuration with unlimited retries
    pub fn unlimited() -> Self {
        Self {
            max_retries: None,
            ..Default::default()
        }
    }

    /// Un-jittered delay for a 1-based retry number
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Sum of every delay this configuration can hand out
    pub fn total_delay(&self) -> Option<Duration> {
        let retries = self.max_retries?;
        Some((1..=retries as u32).map(|n| self.delay_for(n)).sum())
    }
}

/// Exponential backoff state machine
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    current_attempt: usize,
}

impl ExponentialBackoff {
    /// Create a new backoff with default configuration
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    /// Create a new backoff with custom configuration
    pub fn with_config(config: BackoffConfig) -> Self {
        Self {
            config,
            current_attempt: 0,
        }
    }

    /// Get the next delay duration and advance the backoff state
    ///
    /// Returns None if max retries exceeded
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.can_retry() {
            return None;
        }

        self.current_attempt += 1;
        let delay = self.config.delay_for(self.current_attempt as u32);

        Some(self.apply_jitter(delay))
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor == 0.0 {
            return delay;
        }

        let mut rng = rand::thread_rng();
        let jitter = rng.gen::<f64>() * self.config.jitter_factor;
        let jitter_multiplier = 1.0 + (jitter - self.config.jitter_factor / 2.0);

        Duration::from_secs_f64(delay.as_secs_f64() * jitter_multiplier)
    }

    /// Reset the backoff to initial state
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    /// Number of delays handed out so far
    pub fn attempt_number(&self) -> usize {
        self.current_attempt
    }

    /// Check if more retries are available
    pub fn can_retry(&self) -> bool {
        match self.config.max_retries {
            Some(max) => self.current_attempt < max,
            None => true,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_is_one_and_a_half_doubling() {
        let mut backoff = ExponentialBackoff::new();

        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(1500)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(3000)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(6000)));
        assert_eq!(backoff.next_delay(), None);
        assert!(!backoff.can_retry());
    }

    #[test]
    fn test_between_attempts_has_one_fewer_delay() {
        let config = BackoffConfig::between_attempts(Duration::from_millis(1500), 2.0, 3);
        assert_eq!(config.max_retries, Some(2));
        assert_eq!(config.total_delay(), Some(Duration::from_millis(4500)));

        let single = BackoffConfig::between_attempts(Duration::from_millis(1500), 2.0, 1);
        assert_eq!(single.total_delay(), Some(Duration::ZERO));
    }

    #[test]
    fn test_backoff_max_delay() {
        let config = BackoffConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_retries: Some(20),
            jitter_factor: 0.0,
        };
        let mut backoff = ExponentialBackoff::with_config(config);

        let mut last_delay = Duration::ZERO;
        while let Some(delay) = backoff.next_delay() {
            assert!(delay <= Duration::from_millis(100));
            last_delay = delay;
        }
        assert_eq!(last_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = ExponentialBackoff::new();

        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt_number(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt_number(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_backoff_jitter_stays_in_band() {
        let config = BackoffConfig {
            jitter_factor: 0.2,
            ..Default::default()
        };
        let mut backoff = ExponentialBackoff::with_config(config);

        for _ in 0..50 {
            let delay = backoff.next_delay().unwrap();
            assert!(delay >= Duration::from_millis(1350));
            assert!(delay <= Duration::from_millis(1650));
            backoff.reset();
        }
    }

    #[test]
    fn test_backoff_unlimited() {
        let mut backoff = ExponentialBackoff::with_config(BackoffConfig::unlimited());

        for _ in 0..100 {
            assert!(backoff.next_delay().is_some());
        }
        assert_eq!(backoff.config().total_delay(), None);
    }
}
