//! Rule engine for the Aria automation engine
//!
//! Loads automation rules (triggers, conditions, actions), wires their
//! triggers into the scheduler and event bus, and runs their actions
//! against the state machine and skill registry when they fire.

mod action;
mod automation;
mod condition;
mod entity;
mod handler;
mod trigger;

pub use action::{ActionError, ActionOutcome, ActionResult, ActionRunner, ActionSpec, StateSpec};
pub use automation::{parse_automations, Automation};
pub use condition::{Condition, ConditionError, ConditionEvaluator, ConditionResult};
pub use entity::Entity;
pub use handler::AutomationHandler;
pub use trigger::{Trigger, TriggerError, TriggerSpec};
