//! Resilience patterns for connection recovery
//!
//! - Exponential backoff between health-probe retries

pub mod backoff;

pub use backoff::{BackoffConfig, ExponentialBackoff};
