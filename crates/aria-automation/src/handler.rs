//! The automation handler
//!
//! Owns the loaded automations and connects their triggers to the
//! scheduler (interval, cron) and the event bus (event, state). Every
//! trigger firing funnels through [`AutomationHandler::handle_trigger`],
//! which walks the automations in load order, gates on the enabled
//! flag and the condition list, and runs the action list. Automations
//! are isolated from each other: a condition error or failed action in
//! one never stops the others.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, trace, warn};

use aria_scheduler::{JobSchedule, Scheduler};
use aria_skills::SkillRegistry;
use aria_state_machine::StateMachine;

use crate::action::ActionRunner;
use crate::automation::Automation;
use crate::condition::ConditionEvaluator;
use crate::trigger::{Trigger, TriggerSpec};

/// Connects automations to the scheduler and event bus and dispatches
/// trigger firings to their actions
pub struct AutomationHandler {
    automations: Vec<Automation>,
    state_machine: Arc<StateMachine>,
    scheduler: Arc<Scheduler>,
    evaluator: ConditionEvaluator,
    runner: ActionRunner,
}

impl AutomationHandler {
    /// Create a handler over a loaded automation list
    ///
    /// Returns an `Arc` because trigger registration hands weak
    /// references to scheduler jobs and bus listeners.
    pub fn new(
        automations: Vec<Automation>,
        state_machine: Arc<StateMachine>,
        scheduler: Arc<Scheduler>,
        skills: Arc<SkillRegistry>,
    ) -> Arc<Self> {
        let evaluator = ConditionEvaluator::new(Arc::clone(&state_machine));
        let runner = ActionRunner::new(Arc::clone(&state_machine), evaluator.clone(), skills);
        Arc::new(Self {
            automations,
            state_machine,
            scheduler,
            evaluator,
            runner,
        })
    }

    /// The loaded automations, in rule-file order
    pub fn automations(&self) -> &[Automation] {
        &self.automations
    }

    /// Look up an automation by alias
    pub fn automation(&self, alias: &str) -> Option<&Automation> {
        self.automations.iter().find(|a| a.alias == alias)
    }

    /// Register every automation's triggers
    ///
    /// Scheduler job ids are derived from the alias and the trigger's
    /// position, so two automations never collide. A trigger that fails
    /// to register (empty interval, bad cron expression) disables its
    /// automation and is skipped; all other automations still register.
    ///
    /// Registration is deduplicated by trigger type and data: when two
    /// automations carry an identical trigger, only the first gets a
    /// listener or job. A firing already reaches every matching
    /// automation through [`AutomationHandler::handle_trigger`], so a
    /// second registration would run them all twice per firing.
    pub fn register_triggers(self: &Arc<Self>) {
        let mut registered = HashSet::new();
        for automation in &self.automations {
            for (index, spec) in automation.triggers.iter().enumerate() {
                let firing_key = format!(
                    "{}:{}",
                    spec.kind(),
                    serde_json::Value::Object(spec.data_map())
                );
                if registered.contains(&firing_key) {
                    debug!(
                        alias = %automation.alias,
                        index,
                        kind = spec.kind(),
                        "Identical trigger already registered, sharing its firings"
                    );
                    continue;
                }
                match self.register_one(automation, index, spec) {
                    Ok(()) => {
                        registered.insert(firing_key);
                    }
                    Err(e) => {
                        warn!(
                            alias = %automation.alias,
                            index,
                            error = %e,
                            "Trigger registration failed, disabling automation"
                        );
                        automation.disable();
                        break;
                    }
                }
            }
        }
    }

    fn register_one(
        self: &Arc<Self>,
        automation: &Automation,
        index: usize,
        spec: &TriggerSpec,
    ) -> Result<(), crate::trigger::TriggerError> {
        let trigger = Trigger::new(self);
        match spec {
            TriggerSpec::Interval { .. } => {
                let duration = spec.interval_duration()?;
                let data = spec.data_map();
                self.scheduler.add_job(
                    job_id(&automation.alias, index),
                    JobSchedule::interval(duration),
                    move || trigger.fire("interval", data.clone()),
                );
            }
            TriggerSpec::Cron { expression } => {
                let schedule = JobSchedule::cron(expression).map_err(|e| {
                    crate::trigger::TriggerError::InvalidCron {
                        expression: expression.clone(),
                        reason: e.to_string(),
                    }
                })?;
                let data = spec.data_map();
                self.scheduler.add_job(
                    job_id(&automation.alias, index),
                    schedule,
                    move || trigger.fire("cron", data.clone()),
                );
            }
            TriggerSpec::Event { event_name } => {
                let name = event_name.clone();
                self.state_machine
                    .listen_event(event_name.as_str(), move |_event| {
                        let data = match json!({ "event_name": name }) {
                            serde_json::Value::Object(map) => map,
                            _ => unreachable!(),
                        };
                        trigger.fire("event", data);
                    });
            }
            TriggerSpec::State { entity_id } => {
                let id = entity_id.clone();
                self.state_machine
                    .listen_state(entity_id.as_str(), move |_event| {
                        let data = match json!({ "entity_id": id }) {
                            serde_json::Value::Object(map) => map,
                            _ => unreachable!(),
                        };
                        trigger.fire("state", data);
                    });
            }
        }
        debug!(alias = %automation.alias, index, kind = spec.kind(), "Registered trigger");
        Ok(())
    }

    /// Dispatch one trigger firing
    ///
    /// Walks the automations in load order. An automation runs when it
    /// is enabled, one of its triggers matches the firing, and its
    /// condition list holds. A condition error (unknown entity) or a
    /// failing action only affects that automation.
    pub fn handle_trigger(
        &self,
        trigger_type: &str,
        trigger_data: &serde_json::Map<String, serde_json::Value>,
    ) {
        for automation in &self.automations {
            if !automation.is_enabled() {
                continue;
            }
            if !automation
                .triggers
                .iter()
                .any(|t| t.matches(trigger_type, trigger_data))
            {
                continue;
            }

            match self.evaluator.check_condition(&automation.conditions) {
                Ok(true) => {
                    debug!(alias = %automation.alias, "Running automation");
                    let outcome = self.runner.choose_action(&automation.actions);
                    if outcome.failed > 0 {
                        warn!(
                            alias = %automation.alias,
                            failed = outcome.failed,
                            executed = outcome.executed,
                            "Automation finished with failed actions"
                        );
                    }
                }
                Ok(false) => {
                    trace!(alias = %automation.alias, "Conditions not met");
                }
                Err(e) => {
                    error!(
                        alias = %automation.alias,
                        error = %e,
                        "Condition check failed, skipping this automation"
                    );
                }
            }
        }
    }
}

fn job_id(alias: &str, index: usize) -> String {
    format!("{alias}/trigger-{index}")
}
