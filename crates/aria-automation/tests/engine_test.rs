//! End-to-end tests wiring the whole engine together: event bus, state
//! machine, scheduler, skill registry and automation handler.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use aria_automation::{parse_automations, AutomationHandler};
use aria_core::{Event, State};
use aria_event_bus::EventBus;
use aria_scheduler::Scheduler;
use aria_skills::{SkillError, SkillRegistry};
use aria_state_machine::StateMachine;

struct Engine {
    state_machine: Arc<StateMachine>,
    skills: Arc<SkillRegistry>,
    handler: Arc<AutomationHandler>,
    // Held so the coordinator and workers outlive the test body
    _scheduler: Arc<Scheduler>,
}

fn start_engine(records: Vec<serde_json::Value>, setup: impl FnOnce(&SkillRegistry)) -> Engine {
    let bus = Arc::new(EventBus::new());
    let state_machine = Arc::new(StateMachine::new(bus));
    let scheduler = Arc::new(Scheduler::with_workers(4));
    let skills = Arc::new(SkillRegistry::new());
    setup(&skills);

    let handler = AutomationHandler::new(
        parse_automations(&records),
        Arc::clone(&state_machine),
        Arc::clone(&scheduler),
        Arc::clone(&skills),
    );
    handler.register_triggers();

    Engine {
        state_machine,
        skills,
        handler,
        _scheduler: scheduler,
    }
}

#[test]
fn presence_automation_turns_on_light_and_calls_skill() {
    let (tx, rx) = mpsc::channel();
    let engine = start_engine(
        vec![json!({
            "alias": "welcome_home",
            "triggers": [{"type": "state", "entity_id": "presence"}],
            "conditions": [{"condition": "state", "entity_id": "light", "state": "off"}],
            "actions": [
                {"action": "change_state", "entity_id": "light", "state": "on"},
                {"action": "call_skill", "feature_name": "announce", "args": {"text": "welcome"}}
            ]
        })],
        move |skills| {
            skills.register("speech", "announce", move |args| {
                let _ = tx.send(args["text"].clone());
                Ok(json!(null))
            });
        },
    );

    let sm = &engine.state_machine;
    sm.add_state(State::bare("light", "off"));
    sm.add_state(State::bare("presence", "away"));

    sm.set_state("presence", "home", None).unwrap();

    assert!(sm.is_state("light", "on"));
    assert_eq!(rx.try_recv().unwrap(), json!("welcome"));

    // Light is on now, so the condition blocks a second run
    sm.set_state("presence", "away", None).unwrap();
    sm.set_state("presence", "home", None).unwrap();
    assert!(rx.try_recv().is_err());
}

#[test]
fn two_interval_automations_both_fire() {
    let (tx_a, rx_a) = mpsc::channel();
    let (tx_b, rx_b) = mpsc::channel();
    let _engine = start_engine(
        vec![
            json!({
                "alias": "heartbeat_a",
                "triggers": [{"type": "interval", "seconds": 1}],
                "actions": [{"action": "call_skill", "feature_name": "ping_a", "args": {}}]
            }),
            json!({
                "alias": "heartbeat_b",
                "triggers": [{"type": "interval", "seconds": 1}],
                "actions": [{"action": "call_skill", "feature_name": "ping_b", "args": {}}]
            }),
        ],
        move |skills| {
            skills.register("diagnostics", "ping_a", move |_| {
                let _ = tx_a.send(());
                Ok(json!(null))
            });
            skills.register("diagnostics", "ping_b", move |_| {
                let _ = tx_b.send(());
                Ok(json!(null))
            });
        },
    );

    rx_a.recv_timeout(Duration::from_secs(5)).unwrap();
    rx_b.recv_timeout(Duration::from_secs(5)).unwrap();
}

#[test]
fn failed_skill_does_not_stop_remaining_actions() {
    let engine = start_engine(
        vec![json!({
            "alias": "morning_report",
            "triggers": [{"type": "event", "event_name": "alarm_dismissed"}],
            "actions": [
                {"action": "call_skill", "feature_name": "read_news", "args": {}},
                {"action": "change_state", "entity_id": "coffee_machine", "state": "brewing"}
            ]
        })],
        |skills| {
            skills.register("news", "read_news", |_| {
                Err(SkillError::Failed {
                    feature: "read_news".to_string(),
                    reason: "feed unreachable".to_string(),
                })
            });
        },
    );

    engine
        .state_machine
        .fire_event(&Event::new("alarm_dismissed", json!({})));

    assert!(engine.state_machine.is_state("coffee_machine", "brewing"));
}

#[test]
fn event_trigger_fires_with_event_name_data() {
    // Two event automations on different names; only the firing name runs
    let engine = start_engine(
        vec![
            json!({
                "alias": "on_sunset",
                "triggers": [{"type": "event", "event_name": "sunset"}],
                "actions": [{"action": "change_state", "entity_id": "blinds", "state": "closed"}]
            }),
            json!({
                "alias": "on_sunrise",
                "triggers": [{"type": "event", "event_name": "sunrise"}],
                "actions": [{"action": "change_state", "entity_id": "blinds", "state": "open"}]
            }),
        ],
        |_| {},
    );

    engine
        .state_machine
        .fire_event(&Event::new("sunset", json!({})));
    assert!(engine.state_machine.is_state("blinds", "closed"));

    engine
        .state_machine
        .fire_event(&Event::new("sunrise", json!({})));
    assert!(engine.state_machine.is_state("blinds", "open"));
}

#[test]
fn shared_event_trigger_runs_each_automation_once_per_firing() {
    let (tx_a, rx_a) = mpsc::channel();
    let (tx_b, rx_b) = mpsc::channel();
    let engine = start_engine(
        vec![
            json!({
                "alias": "close_blinds",
                "triggers": [{"type": "event", "event_name": "sunset"}],
                "actions": [{"action": "call_skill", "feature_name": "count_a", "args": {}}]
            }),
            json!({
                "alias": "evening_scene",
                "triggers": [{"type": "event", "event_name": "sunset"}],
                "actions": [{"action": "call_skill", "feature_name": "count_b", "args": {}}]
            }),
        ],
        move |skills| {
            skills.register("diagnostics", "count_a", move |_| {
                let _ = tx_a.send(());
                Ok(json!(null))
            });
            skills.register("diagnostics", "count_b", move |_| {
                let _ = tx_b.send(());
                Ok(json!(null))
            });
        },
    );

    engine
        .state_machine
        .fire_event(&Event::new("sunset", json!({})));
    assert_eq!((rx_a.try_iter().count(), rx_b.try_iter().count()), (1, 1));

    engine
        .state_machine
        .fire_event(&Event::new("sunset", json!({})));
    assert_eq!((rx_a.try_iter().count(), rx_b.try_iter().count()), (1, 1));
}

#[test]
fn automations_run_in_load_order() {
    // Both react to the same event and write the same entity; the later
    // automation's write must land last
    let engine = start_engine(
        vec![
            json!({
                "alias": "first",
                "triggers": [{"type": "event", "event_name": "tick"}],
                "actions": [{"action": "change_state", "entity_id": "marker", "state": "first"}]
            }),
            json!({
                "alias": "second",
                "triggers": [{"type": "event", "event_name": "tick"}],
                "actions": [{"action": "change_state", "entity_id": "marker", "state": "second"}]
            }),
        ],
        |_| {},
    );

    engine
        .state_machine
        .fire_event(&Event::new("tick", json!({})));
    assert!(engine.state_machine.is_state("marker", "second"));
}

#[test]
fn skill_mapping_reflects_registrations() {
    let engine = start_engine(vec![], |skills| {
        skills.register("weather", "current_weather", |_| Ok(json!(null)));
        skills.register("weather", "forecast", |_| Ok(json!(null)));
    });

    let mapping = engine.skills.skill_mapping();
    assert_eq!(mapping["weather"].len(), 2);
    assert!(engine.handler.automations().is_empty());
}
