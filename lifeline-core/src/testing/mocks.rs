//! Programmable collaborators for recovery tests
//!
//! - `MockTransport`: per-URL scripted health responses, records every call
//! - `MockStream`: streaming connection with controllable status and a
//!   gate to hold reconnects open

use crate::core::{ProbeError, StreamError};
use crate::health::HealthTransport;
use crate::streaming::StreamingConnection;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::time::Instant;

/// One scripted reply from the mock transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResponse {
    /// Respond immediately with this status
    Status(u16),
    /// Fail immediately with a transport error
    Refused,
    /// Never respond (the probe deadline decides)
    Hang,
    /// Respond with `status` after `delay`
    Delayed(Duration, u16),
}

/// A recorded probe request
#[derive(Debug, Clone)]
pub struct ProbeCall {
    pub url: String,
    pub at: Instant,
}

/// Health transport driven by per-URL scripts.
///
/// Each call pops the next scripted response for the URL; once the script is
/// exhausted the URL's default applies (`Refused` unless set with `always`).
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    defaults: Mutex<HashMap<String, ScriptedResponse>>,
    calls: Mutex<Vec<ProbeCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses for `url`, consumed in order
    pub fn script<I>(&self, url: &str, responses: I)
    where
        I: IntoIterator<Item = ScriptedResponse>,
    {
        self.scripts
            .lock()
            .entry(url.to_string())
            .or_default()
            .extend(responses);
    }

    /// Response used for `url` once its script is exhausted
    pub fn always(&self, url: &str, response: ScriptedResponse) {
        self.defaults.lock().insert(url.to_string(), response);
    }

    pub fn calls(&self) -> Vec<ProbeCall> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.url == url).count()
    }

    fn next_response(&self, url: &str) -> ScriptedResponse {
        if let Some(next) = self.scripts.lock().get_mut(url).and_then(VecDeque::pop_front) {
            return next;
        }
        self.defaults
            .lock()
            .get(url)
            .cloned()
            .unwrap_or(ScriptedResponse::Refused)
    }
}

#[async_trait]
impl HealthTransport for MockTransport {
    async fn get_status(&self, url: &str) -> Result<u16, ProbeError> {
        self.calls.lock().push(ProbeCall {
            url: url.to_string(),
            at: Instant::now(),
        });

        match self.next_response(url) {
            ScriptedResponse::Status(status) => Ok(status),
            ScriptedResponse::Refused => Err(ProbeError::Transport {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
            ScriptedResponse::Hang => std::future::pending().await,
            ScriptedResponse::Delayed(delay, status) => {
                tokio::time::sleep(delay).await;
                Ok(status)
            }
        }
    }
}

/// Releases reconnects held by [`MockStream::hold_reconnects`]
pub struct ReconnectGate {
    tx: watch::Sender<bool>,
}

impl ReconnectGate {
    pub fn release(&self) {
        self.tx.send_replace(true);
    }
}

/// Streaming connection with scriptable status
pub struct MockStream {
    connected: AtomicBool,
    reconnecting: AtomicBool,
    reconnect_calls: AtomicU64,
    failure: Mutex<Option<StreamError>>,
    gate: Mutex<Option<watch::Receiver<bool>>>,
    last_activity: Mutex<Option<SystemTime>>,
}

impl MockStream {
    fn with_status(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
            reconnecting: AtomicBool::new(false),
            reconnect_calls: AtomicU64::new(0),
            failure: Mutex::new(None),
            gate: Mutex::new(None),
            last_activity: Mutex::new(None),
        }
    }

    pub fn connected() -> Self {
        Self::with_status(true)
    }

    pub fn disconnected() -> Self {
        Self::with_status(false)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_reconnecting(&self, reconnecting: bool) {
        self.reconnecting.store(reconnecting, Ordering::SeqCst);
    }

    pub fn set_last_activity(&self, at: Option<SystemTime>) {
        *self.last_activity.lock() = at;
    }

    /// Make every later reconnect fail with `err`
    pub fn fail_reconnects_with(&self, err: StreamError) {
        *self.failure.lock() = Some(err);
    }

    /// Hold reconnects open until the returned gate is released (or dropped)
    pub fn hold_reconnects(&self) -> ReconnectGate {
        let (tx, rx) = watch::channel(false);
        *self.gate.lock() = Some(rx);
        ReconnectGate { tx }
    }

    pub fn reconnect_calls(&self) -> u64 {
        self.reconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamingConnection for MockStream {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> Result<(), StreamError> {
        self.reconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.reconnecting.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);

        let gate = self.gate.lock().clone();
        if let Some(mut gate) = gate {
            // A dropped gate releases too
            let _ = gate.wait_for(|released| *released).await;
        }

        self.reconnecting.store(false, Ordering::SeqCst);
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        self.connected.store(true, Ordering::SeqCst);
        *self.last_activity.lock() = Some(SystemTime::now());
        Ok(())
    }

    fn last_activity(&self) -> Option<SystemTime> {
        *self.last_activity.lock()
    }
}
