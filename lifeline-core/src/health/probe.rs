//! Single bounded-time reachability probe
//!
//! | Response                  | Outcome        |
//! |---------------------------|----------------|
//! | 2xx                       | `Reachable`    |
//! | 401                       | `AuthExpired`  |
//! | anything else             | `Unreachable`  |
//! | transport error / timeout | `Unreachable`  |
//!
//! `AuthExpired` publishes `sessionExpired` on the bus. That is the probe's
//! only side effect.

use super::transport::HealthTransport;
use crate::core::{ProbeError, ProbeOutcome};
use crate::events::{EventBus, RecoveryEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const STATUS_UNAUTHORIZED: u16 = 401;

/// Map an HTTP status code to a probe outcome
pub fn classify_status(status: u16) -> ProbeOutcome {
    match status {
        200..=299 => ProbeOutcome::Reachable,
        STATUS_UNAUTHORIZED => ProbeOutcome::AuthExpired,
        _ => ProbeOutcome::Unreachable,
    }
}

#[derive(Clone)]
pub struct HealthProbe {
    transport: Arc<dyn HealthTransport>,
    bus: EventBus,
}

impl HealthProbe {
    pub fn new(transport: Arc<dyn HealthTransport>, bus: EventBus) -> Self {
        Self { transport, bus }
    }

    /// Probe `url` once, giving up after `timeout`.
    ///
    /// Hitting the deadline drops the in-flight request.
    pub async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        let result = match tokio::time::timeout(timeout, self.transport.get_status(url)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout {
                url: url.to_string(),
                timeout,
            }),
        };

        match result {
            Ok(status) => {
                let outcome = classify_status(status);
                match outcome {
                    ProbeOutcome::Reachable => debug!(url, status, "Endpoint reachable"),
                    ProbeOutcome::AuthExpired => {
                        warn!(url, "Endpoint reachable but session expired");
                        self.bus.publish(RecoveryEvent::SessionExpired {
                            url: url.to_string(),
                        });
                    }
                    ProbeOutcome::Unreachable => {
                        warn!(url, status, "Endpoint answered with unhealthy status")
                    }
                }
                outcome
            }
            Err(err) => {
                warn!(error = %err, "Endpoint unreachable");
                ProbeOutcome::Unreachable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::testing::{EventLog, MockTransport, ScriptedResponse};

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200), ProbeOutcome::Reachable);
        assert_eq!(classify_status(204), ProbeOutcome::Reachable);
        assert_eq!(classify_status(401), ProbeOutcome::AuthExpired);
        assert_eq!(classify_status(403), ProbeOutcome::Unreachable);
        assert_eq!(classify_status(500), ProbeOutcome::Unreachable);
        assert_eq!(classify_status(302), ProbeOutcome::Unreachable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_unreachable() {
        let transport = Arc::new(MockTransport::new());
        transport.script("http://a", [ScriptedResponse::Hang]);
        let probe = HealthProbe::new(transport.clone(), EventBus::new());

        let started = tokio::time::Instant::now();
        let outcome = probe.probe("http://a", Duration::from_secs(5)).await;

        assert_eq!(outcome, ProbeOutcome::Unreachable);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_transport_error_is_unreachable() {
        let transport = Arc::new(MockTransport::new());
        transport.script("http://a", [ScriptedResponse::Refused]);
        let probe = HealthProbe::new(transport, EventBus::new());

        let outcome = probe.probe("http://a", Duration::from_secs(5)).await;
        assert_eq!(outcome, ProbeOutcome::Unreachable);
    }

    #[tokio::test]
    async fn test_auth_expired_publishes_session_expired() {
        let bus = EventBus::new();
        let log = EventLog::attach(&bus);
        let transport = Arc::new(MockTransport::new());
        transport.script("http://a", [ScriptedResponse::Status(401)]);
        let probe = HealthProbe::new(transport, bus);

        let outcome = probe.probe("http://a", Duration::from_secs(5)).await;

        assert_eq!(outcome, ProbeOutcome::AuthExpired);
        assert_eq!(log.count(EventKind::SessionExpired), 1);
    }

    #[tokio::test]
    async fn test_reachable_has_no_side_effects() {
        let bus = EventBus::new();
        let log = EventLog::attach(&bus);
        let transport = Arc::new(MockTransport::new());
        transport.script("http://a", [ScriptedResponse::Status(200)]);
        let probe = HealthProbe::new(transport, bus);

        assert_eq!(
            probe.probe("http://a", Duration::from_secs(5)).await,
            ProbeOutcome::Reachable
        );
        assert!(log.is_empty());
    }
}
