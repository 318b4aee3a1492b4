//! Trigger types and matching
//!
//! A trigger is anything that can start an automation: a timer elapsing
//! (interval), a cron schedule firing, an event on the bus, or an
//! entity's state changing. Trigger records are parsed from the rule
//! file; registration wires them to the scheduler and event bus.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::handler::AutomationHandler;

/// Trigger errors
#[derive(Debug, Clone, Error)]
pub enum TriggerError {
    #[error("interval trigger has no duration")]
    EmptyInterval,

    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
}

/// A declarative trigger record
///
/// Unknown trigger types are rejected when the rule file is parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSpec {
    /// Fires at a fixed interval
    Interval {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hours: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minutes: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seconds: Option<u64>,
    },

    /// Fires on a cron expression (seconds-resolution, 6 fields)
    Cron { expression: String },

    /// Fires when a named event is emitted on the bus
    Event { event_name: String },

    /// Fires when an entity's state changes
    State { entity_id: String },
}

impl TriggerSpec {
    /// The trigger type tag, as used in trigger matching
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerSpec::Interval { .. } => "interval",
            TriggerSpec::Cron { .. } => "cron",
            TriggerSpec::Event { .. } => "event",
            TriggerSpec::State { .. } => "state",
        }
    }

    /// The trigger's type-specific fields as a flat map (the data a
    /// firing of this trigger carries)
    pub fn data_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.remove("type");
                map
            }
            _ => serde_json::Map::new(),
        }
    }

    /// Check whether a firing matches this trigger record
    ///
    /// The type must match, and every key/value pair of the firing's
    /// data must equal the corresponding field of this record.
    pub fn matches(
        &self,
        trigger_type: &str,
        trigger_data: &serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        if self.kind() != trigger_type {
            return false;
        }
        let own = self.data_map();
        trigger_data
            .iter()
            .filter(|(key, _)| key.as_str() != "type")
            .all(|(key, value)| own.get(key) == Some(value))
    }

    /// Total duration of an interval trigger
    pub fn interval_duration(&self) -> Result<Duration, TriggerError> {
        match self {
            TriggerSpec::Interval {
                hours,
                minutes,
                seconds,
            } => {
                let total = hours.unwrap_or(0) * 3600
                    + minutes.unwrap_or(0) * 60
                    + seconds.unwrap_or(0);
                if total == 0 {
                    return Err(TriggerError::EmptyInterval);
                }
                Ok(Duration::from_secs(total))
            }
            _ => Err(TriggerError::EmptyInterval),
        }
    }
}

/// Dispatch half of a registered trigger
///
/// Registration closures (scheduler jobs, bus listeners, state
/// listeners) hold one of these; firing packages the trigger type and
/// data and hands them to the handler. The handle is weak so that
/// long-lived scheduler jobs do not keep a dropped handler alive.
#[derive(Clone)]
pub struct Trigger {
    handler: Weak<AutomationHandler>,
}

impl Trigger {
    /// Create a trigger arm dispatching into the given handler
    pub fn new(handler: &Arc<AutomationHandler>) -> Self {
        Self {
            handler: Arc::downgrade(handler),
        }
    }

    /// Fire the trigger; a no-op once the handler is gone
    pub fn fire(&self, trigger_type: &str, data: serde_json::Map<String, serde_json::Value>) {
        if let Some(handler) = self.handler.upgrade() {
            debug!(trigger_type = %trigger_type, ?data, "Trigger fired");
            handler.handle_trigger(trigger_type, &data);
        }
    }
}
