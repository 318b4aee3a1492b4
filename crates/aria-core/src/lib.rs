//! Core types for the Aria automation engine
//!
//! This crate provides the fundamental types shared by every other part
//! of the engine: State, Event, EventType, EventOrigin, and Context.

mod context;
mod event;
mod state;

pub use context::Context;
pub use event::{Event, EventOrigin, EventType};
pub use state::State;

/// Standard event types fired by the engine
pub mod events {
    use super::State;

    /// Event type for entity state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Event type fired when an entity is first seeded into the state machine
    pub const ENTITY_ADDED: &str = "entity_added";

    /// Event type fired when an entity helper updates its state
    pub const ENTITY_UPDATED: &str = "entity_updated";

    /// Event type fired when an entity is removed from the state machine
    pub const ENTITY_REMOVED: &str = "entity_removed";

    /// Data carried by STATE_CHANGED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: String,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl StateChangedData {
        /// Serialize into the generic event payload
        pub fn into_payload(self) -> serde_json::Value {
            serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
        }

        /// Parse back out of a generic event payload
        pub fn from_payload(value: &serde_json::Value) -> Option<Self> {
            serde_json::from_value(value.clone()).ok()
        }
    }
}
