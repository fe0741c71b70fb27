//! Core vocabulary for connection recovery
//!
//! - `types`: triggers, endpoint roles, probe outcomes, health verdicts
//! - `errors`: error taxonomy for probes, streams and runs
//! - `recovery_fsm`: clock-free Idle/Scheduled/Running gate

pub mod errors;
pub mod recovery_fsm;
pub mod types;

mod admission_proptest;

// Re-export commonly used types
pub use errors::{EndpointError, ProbeError, RecoveryError, StreamError};
pub use recovery_fsm::{admit, Admission, RecoveryPhase};
pub use types::{EndpointRole, HealthVerdict, ProbeOutcome, RecoveryTrigger, UnknownTrigger};
