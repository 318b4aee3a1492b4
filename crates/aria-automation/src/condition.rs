//! Condition types and evaluation
//!
//! Conditions gate an automation's actions: every condition in the list
//! must hold at trigger time for the actions to run.

use chrono::{Local, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

use aria_state_machine::{StateMachine, StateMachineError};

/// Condition errors
#[derive(Debug, Clone, Error)]
pub enum ConditionError {
    #[error(transparent)]
    EntityNotFound(#[from] StateMachineError),
}

/// Result type for condition evaluation
pub type ConditionResult<T> = Result<T, ConditionError>;

/// A declarative condition record
///
/// Unknown condition types are rejected when the rule file is parsed,
/// so evaluation only ever sees these variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Condition {
    /// Entity must currently be in the given state
    State { entity_id: String, state: String },

    /// Current wall-clock time must fall inside [start_time, end_time];
    /// an absent bound is unconstrained
    Time {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_time: Option<NaiveTime>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_time: Option<NaiveTime>,
    },
}

/// Evaluates condition lists against the state machine
#[derive(Clone)]
pub struct ConditionEvaluator {
    state_machine: Arc<StateMachine>,
}

impl ConditionEvaluator {
    /// Create a new condition evaluator
    pub fn new(state_machine: Arc<StateMachine>) -> Self {
        Self { state_machine }
    }

    /// Check whether an entity is in the required state
    ///
    /// Fails when the entity is unknown; the caller decides whether
    /// that suppresses the automation or surfaces.
    pub fn check_state(&self, entity_id: &str, required_state: &str) -> ConditionResult<bool> {
        let current = self.state_machine.get_state(entity_id)?;
        Ok(current.state == required_state)
    }

    /// Check whether `now` falls inside the given bounds (inclusive)
    pub fn check_time(
        &self,
        start: Option<NaiveTime>,
        end: Option<NaiveTime>,
        now: NaiveTime,
    ) -> bool {
        if let Some(start) = start {
            if now < start {
                return false;
            }
        }
        if let Some(end) = end {
            if now > end {
                return false;
            }
        }
        true
    }

    /// Evaluate a condition list as a logical AND
    ///
    /// Short-circuits to false on the first failing condition; an empty
    /// list is vacuously true.
    pub fn check_condition(&self, conditions: &[Condition]) -> ConditionResult<bool> {
        self.check_condition_at(conditions, Local::now().time())
    }

    /// Evaluate with an explicit wall-clock time, for deterministic tests
    pub fn check_condition_at(
        &self,
        conditions: &[Condition],
        now: NaiveTime,
    ) -> ConditionResult<bool> {
        for condition in conditions {
            let passed = match condition {
                Condition::State { entity_id, state } => self.check_state(entity_id, state)?,
                Condition::Time {
                    start_time,
                    end_time,
                } => self.check_time(*start_time, *end_time, now),
            };
            if !passed {
                trace!(?condition, "Condition failed");
                return Ok(false);
            }
        }
        Ok(true)
    }
}
