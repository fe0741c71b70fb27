//! Backend health checking
//!
//! - `transport`: raw HTTP status fetch (hyper client)
//! - `probe`: one bounded-time, classified reachability check
//! - `cascade`: retries, failover and failback across both endpoints

pub mod cascade;
pub mod probe;
pub mod transport;

pub use cascade::CascadingHealthChecker;
pub use probe::{classify_status, HealthProbe};
pub use transport::{HealthTransport, HyperTransport};
