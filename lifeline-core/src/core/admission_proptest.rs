//! Property-based tests for the recovery gate
//!
//! Drives `RecoveryPhase` and `admit` through a virtual-millisecond simulation
//! of arbitrary request bursts and run durations, and checks the single-flight
//! and debounce-monotonicity guarantees across thousands of schedules.
