//! Common utilities for all binaries
//!
//! Shared CLI arguments, config loading, logging setup and event logging.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use lifeline_core::core::StreamError;
use lifeline_core::events::{EventBus, EventKind, RecoveryEvent, Subscription};
use lifeline_core::streaming::StreamingConnection;
use lifeline_core::utils::init_logger;
use lifeline_core::Config;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use tracing::{info, warn};

/// Common CLI arguments for all binaries
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Override the configured log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Log as JSON lines
    #[arg(long)]
    pub json: bool,
}

impl CommonArgs {
    /// Load and validate the configuration file
    pub fn load_config(&self) -> Result<Config> {
        Config::load(&self.config)
            .with_context(|| format!("Failed to load config from {}", self.config.display()))
    }

    /// Initialize tracing from CLI overrides and `[logging]`
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        let level = self.log_level.as_deref().unwrap_or(&config.logging.level);
        init_logger(level, self.json || config.logging.json)
    }
}

/// Log every recovery event; keep the returned subscriptions alive
pub fn log_events(bus: &EventBus) -> Vec<Subscription> {
    EventKind::ALL
        .into_iter()
        .map(|kind| {
            bus.subscribe(kind, |event| match event {
                RecoveryEvent::SessionExpired { url } => {
                    warn!(url = %url, "Session expired, re-authentication needed")
                }
                RecoveryEvent::DataRefreshRequested { trigger } => {
                    info!(trigger = ?trigger, "Data refresh requested")
                }
                RecoveryEvent::EndpointSwitched { is_primary, url } => {
                    info!(is_primary, url = %url, "Endpoint switched")
                }
            })
        })
        .collect()
}

/// Stand-in for a realtime connection when running without one.
///
/// Reports connected, so healthy runs request a refresh. A reconnect
/// completes immediately.
#[derive(Debug)]
pub struct HeadlessStream {
    connected: AtomicBool,
}

impl HeadlessStream {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
        }
    }

    /// Simulate the realtime transport dropping
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

impl Default for HeadlessStream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamingConnection for HeadlessStream {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn is_reconnecting(&self) -> bool {
        false
    }

    async fn reconnect(&self) -> Result<(), StreamError> {
        info!("Headless stream reconnected");
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    fn last_activity(&self) -> Option<SystemTime> {
        None
    }
}
