//! Event types for the event bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event type identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventType(String);

impl EventType {
    /// Create a new event type
    pub fn new(event_type: impl Into<String>) -> Self {
        Self(event_type.into())
    }

    /// Get the event type as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Origin of an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrigin {
    /// Event originated inside this process
    #[default]
    Local,
    /// Event came from a remote source
    Remote,
}

/// An event that can be fired on the event bus
///
/// Events are immutable once constructed and are dispatched
/// synchronously to current listeners; they are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// The type of event
    pub event_type: EventType,

    /// The event payload
    pub data: serde_json::Value,

    /// Origin of the event
    pub origin: EventOrigin,

    /// When the event was fired
    pub time_fired: DateTime<Utc>,
}

impl Event {
    /// Create a new local event with the current timestamp
    pub fn new(event_type: impl Into<EventType>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            origin: EventOrigin::Local,
            time_fired: Utc::now(),
        }
    }

    /// Create an event with a specific origin
    pub fn with_origin(mut self, origin: EventOrigin) -> Self {
        self.origin = origin;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_defaults() {
        let event = Event::new("alarm_triggered", json!({"zone": "hallway"}));
        assert_eq!(event.event_type.as_str(), "alarm_triggered");
        assert_eq!(event.origin, EventOrigin::Local);
        assert_eq!(event.data["zone"], "hallway");
    }

    #[test]
    fn test_event_origin_override() {
        let event = Event::new("ping", json!({})).with_origin(EventOrigin::Remote);
        assert_eq!(event.origin, EventOrigin::Remote);
    }
}
