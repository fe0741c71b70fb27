//! Streaming-connection contract and reconnect supervision
//!
//! The recovery core never owns the realtime transport. It only asks the
//! streaming layer whether it is live and, if not, tells it to rebuild.

pub mod supervisor;

pub use supervisor::{LaunchOutcome, ReconnectSupervisor};

use crate::core::StreamError;
use async_trait::async_trait;
use std::time::SystemTime;

/// Capabilities the orchestrator needs from the persistent streaming connection
#[async_trait]
pub trait StreamingConnection: Send + Sync {
    /// Whether the connection is currently established
    fn is_connected(&self) -> bool;

    /// Whether the streaming layer is already rebuilding itself
    fn is_reconnecting(&self) -> bool;

    /// Fully tear down and rebuild the connection.
    ///
    /// Resolves once the connection is re-established (or has failed).
    async fn reconnect(&self) -> Result<(), StreamError>;

    /// Wall-clock time of the last message seen, if any
    fn last_activity(&self) -> Option<SystemTime>;
}
