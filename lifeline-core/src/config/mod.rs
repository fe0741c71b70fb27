pub mod types;

pub use types::*;

use crate::endpoint::EndpointRegistry;
use anyhow::{Context, Result};
use config::{Config as ConfigLoader, Environment, File};
use std::net::SocketAddr;
use std::path::Path;

impl Config {
    /// Load configuration from file with optional environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();

        let config = ConfigLoader::builder()
            // Start with default values
            .set_default("recovery.debounce_window_ms", 5_000)?
            .set_default("health.probe_timeout_ms", 5_000)?
            .set_default("health.max_retries", 3)?
            .set_default("health.backoff_base_ms", 1_500)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("monitoring.enabled", true)?
            .set_default("monitoring.listen_addr", "127.0.0.1:9464")?
            // Load from TOML file
            .add_source(File::from(config_path))
            // Override with environment variables (LIFELINE__SECTION__KEY)
            .add_source(
                Environment::with_prefix("LIFELINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to build configuration from {}", config_path.display()))?;

        let cfg: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Load from default location (./config/default.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("config/default.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.primary.trim().is_empty() || self.endpoints.secondary.trim().is_empty() {
            anyhow::bail!("endpoints.primary and endpoints.secondary must both be set");
        }

        if self.endpoints.primary == self.endpoints.secondary {
            anyhow::bail!(
                "endpoints.primary and endpoints.secondary must differ (both '{}')",
                self.endpoints.primary
            );
        }

        if self.recovery.debounce_window_ms == 0 {
            anyhow::bail!("recovery.debounce_window_ms must be positive");
        }

        if self.health.probe_timeout_ms == 0 {
            anyhow::bail!("health.probe_timeout_ms must be positive");
        }

        if self.health.max_retries == 0 {
            anyhow::bail!("health.max_retries must be at least 1");
        }

        let multiplier = self.health.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            anyhow::bail!(
                "health.backoff_multiplier must be >= 1.0 (got {})",
                multiplier
            );
        }

        if self.triggers.sleep_tick_ms == 0 {
            anyhow::bail!("triggers.sleep_tick_ms must be positive");
        }

        if self.triggers.sleep_tick_ms >= self.triggers.sleep_gap_threshold_ms {
            anyhow::bail!(
                "triggers.sleep_tick_ms ({}) must be smaller than triggers.sleep_gap_threshold_ms ({})",
                self.triggers.sleep_tick_ms,
                self.triggers.sleep_gap_threshold_ms
            );
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}', must be one of: {:?}",
                self.logging.level,
                valid_log_levels
            );
        }

        if self.monitoring.enabled {
            self.monitoring_addr()?;
        }

        Ok(())
    }

    /// Build the endpoint registry described by `[endpoints]`
    pub fn endpoint_registry(&self) -> Result<EndpointRegistry> {
        EndpointRegistry::new(&self.endpoints.primary, &self.endpoints.secondary)
            .context("Invalid endpoint configuration")
    }

    /// Parsed `monitoring.listen_addr`
    pub fn monitoring_addr(&self) -> Result<SocketAddr> {
        self.monitoring
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid monitoring.listen_addr '{}'", self.monitoring.listen_addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn base_config() -> Config {
        Config {
            endpoints: EndpointsConfig {
                primary: "http://primary/health".to_string(),
                secondary: "http://secondary/health".to_string(),
            },
            recovery: RecoveryConfig::default(),
            health: HealthCheckConfig::default(),
            triggers: TriggerConfig::default(),
            logging: LoggingConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }

    #[test]
    fn test_config_validation() {
        let mut config = base_config();
        assert!(config.validate().is_ok());

        // Identical endpoints
        config.endpoints.secondary = config.endpoints.primary.clone();
        assert!(config.validate().is_err());
        config.endpoints.secondary = "http://secondary/health".to_string();

        // Zero retries
        config.health.max_retries = 0;
        assert!(config.validate().is_err());
        config.health.max_retries = 3;

        // Shrinking backoff
        config.health.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
        config.health.backoff_multiplier = 2.0;

        // Tick longer than the sleep threshold
        config.triggers.sleep_tick_ms = 20_000;
        assert!(config.validate().is_err());
        config.triggers = TriggerConfig::default();

        // Bad log level
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "debug".to_string();

        // Bad listen address only matters when monitoring is on
        config.monitoring.listen_addr = "nowhere".to_string();
        assert!(config.validate().is_err());
        config.monitoring.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_reproduce_production_tuning() {
        let config = base_config();
        assert_eq!(config.recovery.debounce_window(), Duration::from_secs(5));
        assert_eq!(config.health.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.health.max_retries, 3);
        assert_eq!(config.health.backoff_base(), Duration::from_millis(1500));
        assert!(config.health.auth_expired_is_healthy);
    }

    #[test]
    fn test_load_from_toml_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[endpoints]
primary = "http://api.example.com/health"
secondary = "http://backup.example.com/health"

[health]
max_retries = 5
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.endpoints.primary, "http://api.example.com/health");
        assert_eq!(config.health.max_retries, 5);
        assert_eq!(config.health.probe_timeout_ms, 5_000);
        assert_eq!(config.recovery.debounce_window_ms, 5_000);
        assert_eq!(config.logging.level, "info");

        let registry = config.endpoint_registry().unwrap();
        assert!(registry.is_primary_active());
    }

    #[test]
    fn test_shipped_default_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/default.toml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.recovery, RecoveryConfig::default());
        assert_eq!(config.health, HealthCheckConfig::default());
        assert_eq!(config.triggers, TriggerConfig::default());
        assert_eq!(config.monitoring_addr().unwrap().port(), 9464);
    }

    #[test]
    fn test_load_rejects_missing_endpoints() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[recovery]\ndebounce_window_ms = 1000").unwrap();

        assert!(Config::load(file.path()).is_err());
    }
}
