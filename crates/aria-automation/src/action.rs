//! Action types and dispatch
//!
//! Actions are the side-effecting half of an automation: change an
//! entity's state, call out to a skill feature, or re-check a condition
//! list. Action lists run in order with no rollback; a failed action is
//! logged and the rest of the list still runs.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use aria_core::State;
use aria_skills::{SkillError, SkillRegistry};
use aria_state_machine::{StateMachine, StateMachineError};

use crate::condition::{Condition, ConditionError, ConditionEvaluator};

/// Action errors
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error(transparent)]
    Skill(#[from] SkillError),

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),

    #[error(transparent)]
    Condition(#[from] ConditionError),
}

/// Result type for action dispatch
pub type ActionResult<T> = Result<T, ActionError>;

/// The target state of a change_state action
///
/// Accepts either a bare state label or a full state record with
/// attributes, matching both shapes the rule file allows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateSpec {
    /// Just a state label; attributes carry over from the current state
    Label(String),

    /// A full state record
    Record {
        entity_id: String,
        state: String,
        #[serde(default)]
        attributes: HashMap<String, serde_json::Value>,
    },
}

impl StateSpec {
    /// The state label this spec resolves to
    pub fn label(&self) -> &str {
        match self {
            StateSpec::Label(label) => label,
            StateSpec::Record { state, .. } => state,
        }
    }

    fn attributes(&self) -> Option<HashMap<String, serde_json::Value>> {
        match self {
            StateSpec::Label(_) => None,
            StateSpec::Record { attributes, .. } => Some(attributes.clone()),
        }
    }
}

/// A declarative action record
///
/// Unknown action types are rejected when the rule file is parsed, so
/// dispatch only ever sees these variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionSpec {
    /// Set an entity's state, seeding the entity if it is unknown
    ChangeState { entity_id: String, state: StateSpec },

    /// Invoke a skill feature by name
    CallSkill {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        skill_name: Option<String>,
        feature_name: String,
        #[serde(default)]
        args: serde_json::Value,
    },

    /// Evaluate a condition list (result is logged, not acted on)
    CheckCondition { conditions: Vec<Condition> },
}

/// Summary of one action-list run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Actions that completed
    pub executed: usize,
    /// Actions that failed and were skipped over
    pub failed: usize,
}

/// Executes action lists against the state machine and skill registry
pub struct ActionRunner {
    state_machine: Arc<StateMachine>,
    evaluator: ConditionEvaluator,
    skills: Arc<SkillRegistry>,
}

impl ActionRunner {
    /// Create a new action runner
    pub fn new(
        state_machine: Arc<StateMachine>,
        evaluator: ConditionEvaluator,
        skills: Arc<SkillRegistry>,
    ) -> Self {
        Self {
            state_machine,
            evaluator,
            skills,
        }
    }

    /// Set an entity's state, seeding it first if unknown
    pub fn change_state(&self, entity_id: &str, spec: &StateSpec) -> ActionResult<()> {
        if self.state_machine.has_entity(entity_id) {
            self.state_machine
                .set_state(entity_id, spec.label(), spec.attributes())?;
        } else {
            self.state_machine.add_state(State::new(
                entity_id,
                spec.label(),
                spec.attributes().unwrap_or_default(),
                aria_core::Context::new(),
            ));
        }
        Ok(())
    }

    /// Evaluate a condition list
    pub fn check_condition(&self, conditions: &[Condition]) -> ActionResult<bool> {
        Ok(self.evaluator.check_condition(conditions)?)
    }

    /// Call a skill feature, propagating its typed failure
    pub fn call_skill(
        &self,
        feature_name: &str,
        args: &serde_json::Value,
    ) -> ActionResult<serde_json::Value> {
        Ok(self.skills.call_feature(feature_name, args)?)
    }

    /// Check that a feature is registered under the skill the rule names
    ///
    /// An unregistered feature passes here and surfaces as
    /// NotImplemented from the call itself.
    fn verify_skill(&self, skill: &str, feature: &str) -> ActionResult<()> {
        match self.skills.describe(feature) {
            Some(description) if description.skill != skill => {
                Err(ActionError::Skill(SkillError::Failed {
                    feature: feature.to_string(),
                    reason: format!(
                        "registered under skill '{}', not '{skill}'",
                        description.skill
                    ),
                }))
            }
            _ => Ok(()),
        }
    }

    /// Run an action list in order
    ///
    /// A failing action is logged and skipped; later actions still run
    /// and earlier ones are not rolled back.
    pub fn choose_action(&self, actions: &[ActionSpec]) -> ActionOutcome {
        let mut outcome = ActionOutcome::default();
        for action in actions {
            match self.run_one(action) {
                Ok(()) => outcome.executed += 1,
                Err(e) => {
                    error!(?action, error = %e, "Action failed, continuing with next");
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }

    fn run_one(&self, action: &ActionSpec) -> ActionResult<()> {
        match action {
            ActionSpec::ChangeState { entity_id, state } => {
                debug!(entity_id = %entity_id, state = %state.label(), "Action: change_state");
                self.change_state(entity_id, state)
            }
            ActionSpec::CallSkill {
                skill_name,
                feature_name,
                args,
            } => {
                debug!(feature = %feature_name, "Action: call_skill");
                if let Some(skill) = skill_name {
                    self.verify_skill(skill, feature_name)?;
                }
                self.call_skill(feature_name, args).map(|_| ())
            }
            ActionSpec::CheckCondition { conditions } => {
                let result = self.check_condition(conditions)?;
                debug!(result, "Action: check_condition");
                Ok(())
            }
        }
    }
}
