//! Recovery notifications and their in-process bus

pub mod bus;

pub use bus::{EventBus, EventKind, RecoveryEvent, Subscription};
