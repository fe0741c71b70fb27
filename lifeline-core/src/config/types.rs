use crate::resilience::BackoffConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub endpoints: EndpointsConfig,

    #[serde(default)]
    pub recovery: RecoveryConfig,

    #[serde(default)]
    pub health: HealthCheckConfig,

    #[serde(default)]
    pub triggers: TriggerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Backend health URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Primary health URL
    pub primary: String,

    /// Secondary (fallback) health URL
    pub secondary: String,
}

/// Orchestrator gate tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Quiet period enforced after every run start and finish
    #[serde(default = "default_debounce_window_ms")]
    pub debounce_window_ms: u64,
}

impl RecoveryConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: default_debounce_window_ms(),
        }
    }
}

/// Cascading health check tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Deadline for a single probe
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Probe attempts against the active endpoint
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay after the first failed attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Growth factor between consecutive delays
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Treat a 401 as a healthy network path (no retries, no failover)
    #[serde(default = "default_true")]
    pub auth_expired_is_healthy: bool,
}

impl HealthCheckConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Backoff handed out between attempts on the active endpoint
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig::between_attempts(
            self.backoff_base(),
            self.backoff_multiplier,
            self.max_retries,
        )
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            auth_expired_is_healthy: true,
        }
    }
}

/// Trigger source tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Sleep detector tick
    #[serde(default = "default_sleep_tick_ms")]
    pub sleep_tick_ms: u64,

    /// Wall-clock jump beyond the tick that counts as sleep
    #[serde(default = "default_sleep_gap_threshold_ms")]
    pub sleep_gap_threshold_ms: u64,
}

impl TriggerConfig {
    pub fn sleep_tick(&self) -> Duration {
        Duration::from_millis(self.sleep_tick_ms)
    }

    pub fn sleep_gap_threshold(&self) -> Duration {
        Duration::from_millis(self.sleep_gap_threshold_ms)
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            sleep_tick_ms: default_sleep_tick_ms(),
            sleep_gap_threshold_ms: default_sleep_gap_threshold_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Metrics / status server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: default_listen_addr(),
        }
    }
}

// Default value functions
fn default_debounce_window_ms() -> u64 {
    5_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_sleep_tick_ms() -> u64 {
    2_000
}

fn default_sleep_gap_threshold_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:9464".to_string()
}

fn default_true() -> bool {
    true
}
