//! Event recorder for assertions on bus traffic

use crate::events::{EventBus, EventKind, RecoveryEvent, Subscription};
use parking_lot::Mutex;
use std::sync::Arc;

/// Collects every event published on a bus while alive
pub struct EventLog {
    events: Arc<Mutex<Vec<RecoveryEvent>>>,
    _subscriptions: Vec<Subscription>,
}

impl EventLog {
    /// Subscribe to every event kind on `bus`
    pub fn attach(bus: &EventBus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let sink = Arc::clone(&events);
                bus.subscribe(kind, move |event| sink.lock().push(event.clone()))
            })
            .collect();

        Self {
            events,
            _subscriptions: subscriptions,
        }
    }

    pub fn events(&self) -> Vec<RecoveryEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// `isPrimary` of every `endpointSwitched` event, in order
    pub fn switches(&self) -> Vec<bool> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                RecoveryEvent::EndpointSwitched { is_primary, .. } => Some(*is_primary),
                _ => None,
            })
            .collect()
    }
}
