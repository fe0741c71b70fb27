//! Observability for connection recovery
//!
//! - `metrics`: Prometheus counters, gauges and histograms
//! - `server`: HTTP endpoint exposing `/metrics` and `/status`

pub mod metrics;
pub mod server;

pub use metrics::RecoveryMetrics;
pub use server::{StatusProvider, StatusServer, StatusServerConfig};
