//! Recovery orchestration
//!
//! - `orchestrator`: the single-flight, debounced gate and the run body
//! - `status`: request/run outcomes, counters and snapshots

pub mod orchestrator;
pub mod status;

pub use orchestrator::{OrchestratorBuilder, RecoveryOrchestrator};
pub use status::{RecoveryStats, RecoveryStatus, RequestOutcome, RunOutcome};
