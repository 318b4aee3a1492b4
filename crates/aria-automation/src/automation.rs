//! Automation records and rule parsing
//!
//! An automation binds triggers, conditions and actions under an alias.
//! Rule files hold a list of automation records; parsing is lenient at
//! the list level (a malformed record is logged and skipped) but strict
//! within a record (unknown trigger/condition/action types reject the
//! whole record).

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;
use tracing::{info, warn};

use crate::action::ActionSpec;
use crate::condition::Condition;
use crate::trigger::TriggerSpec;

fn enabled() -> AtomicBool {
    AtomicBool::new(true)
}

/// One automation rule
#[derive(Debug, Deserialize)]
pub struct Automation {
    /// Human-readable name, also used to derive scheduler job ids
    pub alias: String,

    /// Any matching trigger starts the automation
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,

    /// All conditions must hold for the actions to run
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Actions run in order once the conditions pass
    #[serde(default)]
    pub actions: Vec<ActionSpec>,

    #[serde(skip, default = "enabled")]
    enabled: AtomicBool,
}

impl Automation {
    /// Whether this automation currently reacts to trigger firings
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Re-enable the automation
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Disable the automation; registered triggers keep firing but are
    /// ignored until it is enabled again
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }
}

/// Parse a rule list, skipping records that do not parse
///
/// Every skipped record is logged with its position and the parse
/// error; one bad record never takes down the rest of the file.
pub fn parse_automations(records: &[serde_json::Value]) -> Vec<Automation> {
    let mut automations = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match serde_json::from_value::<Automation>(record.clone()) {
            Ok(automation) => {
                info!(alias = %automation.alias, "Loaded automation");
                automations.push(automation);
            }
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed automation record");
            }
        }
    }
    automations
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_automation() {
        let records = vec![json!({
            "alias": "evening_lights",
            "triggers": [{"type": "state", "entity_id": "presence"}],
            "conditions": [{"condition": "state", "entity_id": "light", "state": "off"}],
            "actions": [{"action": "change_state", "entity_id": "light", "state": "on"}]
        })];

        let automations = parse_automations(&records);
        assert_eq!(automations.len(), 1);
        assert_eq!(automations[0].alias, "evening_lights");
        assert_eq!(automations[0].triggers.len(), 1);
        assert!(automations[0].is_enabled());
    }

    #[test]
    fn test_malformed_record_is_skipped_not_fatal() {
        let records = vec![
            json!({"alias": "good", "triggers": [], "conditions": [], "actions": []}),
            // Unknown trigger type rejects the whole record
            json!({
                "alias": "bad",
                "triggers": [{"type": "webhook", "id": "x"}],
                "actions": []
            }),
            json!({"alias": "also_good"}),
        ];

        let automations = parse_automations(&records);
        let aliases: Vec<_> = automations.iter().map(|a| a.alias.as_str()).collect();
        assert_eq!(aliases, vec!["good", "also_good"]);
    }

    #[test]
    fn test_enable_disable() {
        let automation: Automation =
            serde_json::from_value(json!({"alias": "toggle_me"})).unwrap();

        assert!(automation.is_enabled());
        automation.disable();
        assert!(!automation.is_enabled());
        automation.enable();
        assert!(automation.is_enabled());
    }
}
