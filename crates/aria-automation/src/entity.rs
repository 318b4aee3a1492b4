//! Entity helper
//!
//! A thin handle binding one entity id to the state machine. Skills
//! that own a device or value use it to seed, update and retire their
//! entity without repeating the id everywhere, and it announces the
//! entity's lifecycle on the bus (entity_added, entity_updated,
//! entity_removed) on top of the state machine's own state_changed.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use aria_core::events::{ENTITY_ADDED, ENTITY_REMOVED, ENTITY_UPDATED};
use aria_core::{Context, Event, State};
use aria_state_machine::{StateMachine, StateMachineResult};

/// Handle to one entity in the state machine
pub struct Entity {
    entity_id: String,
    state_machine: Arc<StateMachine>,
}

impl Entity {
    /// Seed an entity and announce it
    ///
    /// Overwrites any existing state under the same id. Fires
    /// entity_added but no state_changed, matching direct seeding.
    pub fn add(
        state_machine: Arc<StateMachine>,
        entity_id: impl Into<String>,
        initial_state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
    ) -> Self {
        let entity_id = entity_id.into();
        let state = State::new(&entity_id, initial_state, attributes, Context::new());
        state_machine.add_state(state);
        debug!(entity_id = %entity_id, "Entity added");
        state_machine.fire_event(&Event::new(
            ENTITY_ADDED,
            json!({ "entity_id": entity_id }),
        ));
        Self {
            entity_id,
            state_machine,
        }
    }

    /// The entity id this handle is bound to
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Current state of the entity
    pub fn state(&self) -> StateMachineResult<State> {
        self.state_machine.get_state(&self.entity_id)
    }

    /// Update the entity's state and announce the update
    pub fn set_state(
        &self,
        new_state: impl Into<String>,
        attributes: Option<HashMap<String, serde_json::Value>>,
    ) -> StateMachineResult<State> {
        let updated = self
            .state_machine
            .set_state(&self.entity_id, new_state, attributes)?;
        self.state_machine.fire_event(&Event::new(
            ENTITY_UPDATED,
            json!({ "entity_id": self.entity_id, "state": updated.state }),
        ));
        Ok(updated)
    }

    /// Remove the entity from the state machine and announce it
    ///
    /// The handle is consumed; a no-op if something else already
    /// removed the entity.
    pub fn remove(self) -> Option<State> {
        let removed = self.state_machine.remove_state(&self.entity_id);
        if removed.is_some() {
            self.state_machine.fire_event(&Event::new(
                ENTITY_REMOVED,
                json!({ "entity_id": self.entity_id }),
            ));
        }
        removed
    }
}
