//! State type representing an entity's current state

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Context;

/// The state of an entity at a point in time
///
/// A State is immutable per version: updating an entity constructs a
/// fresh State rather than mutating the stored one. The context is
/// carried across updates unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// The entity this state belongs to (e.g., "light", "alarm")
    pub entity_id: String,

    /// The state value (e.g., "on", "off", "armed")
    pub state: String,

    /// Additional attributes associated with the state
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value was last changed
    pub last_changed: DateTime<Utc>,

    /// When the state was last written, changed or not
    pub last_updated: DateTime<Utc>,

    /// Context of the change that created this state
    #[serde(default)]
    pub context: Context,
}

impl State {
    /// Create a new state with the current timestamp
    pub fn new(
        entity_id: impl Into<String>,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// Create a state with empty attributes and a fresh context
    pub fn bare(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self::new(entity_id, state, HashMap::new(), Context::new())
    }

    /// Construct the successor of this state
    ///
    /// Preserves the context, falls back to the previous attributes when
    /// none are supplied, and stamps both timestamps with now.
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: Option<HashMap<String, serde_json::Value>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id: self.entity_id.clone(),
            state: new_state.into(),
            attributes: new_attributes.unwrap_or_else(|| self.attributes.clone()),
            last_changed: now,
            last_updated: now,
            context: self.context.clone(),
        }
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps and context are not compared
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}
