//! In-process event bus for recovery notifications
//!
//! Produced events:
//! - `sessionExpired`: a probe got 401, hand off to the auth-refresh owner
//! - `dataRefreshRequested`: consumers may be stale and should refetch
//! - `endpointSwitched { isPrimary }`: failover or failback happened
//!
//! Handlers run synchronously on the publisher's task. Handler lists are
//! cloned out of the map before dispatch, so a handler may subscribe or
//! unsubscribe without deadlocking the bus.

use crate::core::RecoveryTrigger;
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Notification emitted by the recovery core
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RecoveryEvent {
    SessionExpired {
        url: String,
    },
    DataRefreshRequested {
        trigger: Option<RecoveryTrigger>,
    },
    EndpointSwitched {
        is_primary: bool,
        url: String,
    },
}

impl RecoveryEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RecoveryEvent::SessionExpired { .. } => EventKind::SessionExpired,
            RecoveryEvent::DataRefreshRequested { .. } => EventKind::DataRefreshRequested,
            RecoveryEvent::EndpointSwitched { .. } => EventKind::EndpointSwitched,
        }
    }
}

/// Subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionExpired,
    DataRefreshRequested,
    EndpointSwitched,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::SessionExpired,
        EventKind::DataRefreshRequested,
        EventKind::EndpointSwitched,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SessionExpired => "sessionExpired",
            EventKind::DataRefreshRequested => "dataRefreshRequested",
            EventKind::EndpointSwitched => "endpointSwitched",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Handler = Arc<dyn Fn(&RecoveryEvent) + Send + Sync>;

struct BusInner {
    handlers: DashMap<EventKind, Vec<(u64, Handler)>>,
    next_id: AtomicU64,
    published: AtomicU64,
}

/// Cloneable handle to a shared bus
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: DashMap::new(),
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
            }),
        }
    }

    /// Deliver `event` to every handler subscribed to its kind
    pub fn publish(&self, event: RecoveryEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .inner
            .handlers
            .get(&kind)
            .map(|entry| entry.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        self.inner.published.fetch_add(1, Ordering::Relaxed);
        debug!(event = %kind, subscribers = handlers.len(), "Publishing recovery event");

        for handler in handlers {
            handler(&event);
        }
    }

    /// Register a handler for one event kind.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&RecoveryEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            bus: Arc::downgrade(&self.inner),
            kind,
            id,
            active: true,
        }
    }

    /// Number of handlers currently registered for `kind`
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner.handlers.get(&kind).map_or(0, |entry| entry.len())
    }

    /// Total events published since creation
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("published", &self.published_count())
            .finish_non_exhaustive()
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    bus: Weak<BusInner>,
    kind: EventKind,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove the handler now
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the handler registered for the lifetime of the bus
    pub fn detach(mut self) {
        self.active = false;
    }

    fn remove(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        if let Some(bus) = self.bus.upgrade() {
            if let Some(mut entry) = bus.handlers.get_mut(&self.kind) {
                entry.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}
