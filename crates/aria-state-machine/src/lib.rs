//! State machine for the Aria automation engine
//!
//! This crate provides the StateMachine, which tracks the current state
//! of every entity the assistant knows about. It wraps an EventBus and
//! fires a STATE_CHANGED event after every successful update, which is
//! what state triggers and per-entity listeners hang off.

use std::collections::HashMap;
use std::sync::Arc;

use aria_core::events::{StateChangedData, STATE_CHANGED};
use aria_core::{Event, State};
use aria_event_bus::{EventBus, ListenerId};
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors from state machine operations
#[derive(Debug, Clone, Error)]
pub enum StateMachineError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),
}

/// Result type for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// The state machine tracks all entity states
///
/// States are keyed by entity id; at most one State exists per entity at
/// any time. The map is sharded, so read-modify-write sequences on a
/// single entity are atomic even when scheduler worker threads and
/// listener callbacks race on it.
pub struct StateMachine {
    states: DashMap<String, State>,
    event_bus: Arc<EventBus>,
}

impl StateMachine {
    /// Create a new state machine wrapping the given event bus
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            event_bus,
        }
    }

    /// Seed or overwrite an entity's state
    ///
    /// Used for initial seeding; unlike [`StateMachine::set_state`] it
    /// never fails and does not emit a STATE_CHANGED event.
    pub fn add_state(&self, state: State) {
        trace!(entity_id = %state.entity_id, state = %state.state, "Adding state");
        self.states.insert(state.entity_id.clone(), state);
    }

    /// Get the current state of an entity
    pub fn get_state(&self, entity_id: &str) -> StateMachineResult<State> {
        self.states
            .get(entity_id)
            .map(|s| s.clone())
            .ok_or_else(|| StateMachineError::EntityNotFound(entity_id.to_string()))
    }

    /// Check whether an entity is currently tracked
    pub fn has_entity(&self, entity_id: &str) -> bool {
        self.states.contains_key(entity_id)
    }

    /// Check if an entity is in a specific state
    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.states
            .get(entity_id)
            .map(|s| s.state == state)
            .unwrap_or(false)
    }

    /// Update the state of an existing entity
    ///
    /// The entity must already be tracked. A fresh State is constructed
    /// preserving the previous context, using the supplied attributes or
    /// falling back to the previous ones, with both timestamps set to
    /// now. Emits exactly one STATE_CHANGED event with the old and new
    /// state after the update lands.
    pub fn set_state(
        &self,
        entity_id: &str,
        new_state: impl Into<String>,
        attributes: Option<HashMap<String, serde_json::Value>>,
    ) -> StateMachineResult<State> {
        let (old_state, updated) = {
            let mut entry = self
                .states
                .get_mut(entity_id)
                .ok_or_else(|| StateMachineError::EntityNotFound(entity_id.to_string()))?;
            let old_state = entry.clone();
            let updated = old_state.with_update(new_state, attributes);
            *entry = updated.clone();
            (old_state, updated)
        };

        debug!(
            entity_id = %entity_id,
            old = %old_state.state,
            new = %updated.state,
            "State updated"
        );

        let data = StateChangedData {
            entity_id: entity_id.to_string(),
            old_state: Some(old_state),
            new_state: Some(updated.clone()),
        };
        self.event_bus
            .emit_event(&Event::new(STATE_CHANGED, data.into_payload()));

        Ok(updated)
    }

    /// Remove an entity's state; no-op if the entity is unknown
    pub fn remove_state(&self, entity_id: &str) -> Option<State> {
        let removed = self.states.remove(entity_id).map(|(_, s)| s);
        if removed.is_some() {
            trace!(entity_id = %entity_id, "Removed state");
        }
        removed
    }

    /// Register a callback for state changes of one entity
    ///
    /// The callback receives the STATE_CHANGED event whenever the given
    /// entity updates; changes to other entities are filtered out.
    pub fn listen_state(
        &self,
        entity_id: impl Into<String>,
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> ListenerId {
        let entity_id = entity_id.into();
        self.event_bus.add_listener(STATE_CHANGED, move |event| {
            if event.data.get("entity_id").and_then(|v| v.as_str()) == Some(entity_id.as_str()) {
                callback(event);
            }
        })
    }

    /// Fire an event on the wrapped bus
    pub fn fire_event(&self, event: &Event) {
        self.event_bus.emit_event(event);
    }

    /// Register a listener on the wrapped bus
    pub fn listen_event(
        &self,
        event_type: impl Into<aria_core::EventType>,
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> ListenerId {
        self.event_bus.add_listener(event_type, callback)
    }

    /// Access the wrapped event bus
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// All tracked entity ids
    pub fn entity_ids(&self) -> Vec<String> {
        self.states.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of tracked entities
    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

/// Thread-safe wrapper for StateMachine
pub type SharedStateMachine = Arc<StateMachine>;
