//! Event bus with synchronous pub/sub for the Aria automation engine
//!
//! This crate provides the EventBus, the central message broker of the
//! engine. Components register listener callbacks for event types and
//! fire events at them; listeners run synchronously on the firing
//! thread, in registration order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use aria_core::{Event, EventType};
use tracing::{debug, trace, warn};

/// A listener callback invoked with each matching event
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// A unique identifier for an event listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    callback: Listener,
}

/// The event bus for publishing and subscribing to events
///
/// The listener table is guarded by a single mutex; the lock is never
/// held while a callback runs, so listeners may fire further events or
/// add and remove listeners without deadlocking.
pub struct EventBus {
    listeners: Mutex<HashMap<EventType, Vec<Registration>>>,
    next_listener_id: AtomicU64,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Register a listener for an event type
    ///
    /// Listeners for the same event type are invoked in registration
    /// order. Returns the id to use with [`EventBus::remove_listener`].
    pub fn add_listener(
        &self,
        event_type: impl Into<EventType>,
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> ListenerId {
        let event_type = event_type.into();
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        trace!(event_type = %event_type, listener_id = id.0, "Adding listener");

        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.entry(event_type).or_default().push(Registration {
            id,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove a single listener registration
    ///
    /// Returns `true` when a registration was removed, `false` when no
    /// matching registration exists. A listener removed while an
    /// emission of its event type is in progress will not be invoked
    /// again during that emission.
    pub fn remove_listener(&self, event_type: impl Into<EventType>, id: ListenerId) -> bool {
        let event_type = event_type.into();
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());

        let Some(registrations) = listeners.get_mut(&event_type) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        let removed = registrations.len() < before;
        if registrations.is_empty() {
            listeners.remove(&event_type);
        }
        if removed {
            trace!(event_type = %event_type, listener_id = id.0, "Removed listener");
        }
        removed
    }

    /// Fire an event at every listener registered for its type
    ///
    /// Listeners are invoked synchronously, in registration order, on
    /// the calling thread. Firing an event type nobody listens to is a
    /// logged no-op. Each listener's registration is re-checked right
    /// before it runs, so removals earlier in the same emission take
    /// effect immediately.
    pub fn emit_event(&self, event: &Event) {
        debug!(event_type = %event.event_type, "Firing event");

        let snapshot: Vec<(ListenerId, Listener)> = {
            let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            match listeners.get(&event.event_type) {
                Some(registrations) => registrations
                    .iter()
                    .map(|r| (r.id, Arc::clone(&r.callback)))
                    .collect(),
                None => {
                    warn!(event_type = %event.event_type, "No listeners for event type");
                    return;
                }
            }
        };

        for (id, callback) in snapshot {
            if self.is_registered(&event.event_type, id) {
                callback(event);
            }
        }
    }

    /// Number of listeners registered for an event type
    pub fn listener_count(&self, event_type: impl Into<EventType>) -> usize {
        let event_type = event_type.into();
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.get(&event_type).map(Vec::len).unwrap_or(0)
    }

    fn is_registered(&self, event_type: &EventType, id: ListenerId) -> bool {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners
            .get(event_type)
            .map(|regs| regs.iter().any(|r| r.id == id))
            .unwrap_or(false)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;
