//! Aria automation engine
//!
//! Main entry point: loads settings and rules from the config
//! directory, wires the event bus, state machine, scheduler and skill
//! registry together, registers the automations' triggers and then
//! stays resident while scheduler jobs and bus listeners do the work.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use aria_automation::{parse_automations, AutomationHandler};
use aria_config::{load_rules, Settings};
use aria_event_bus::EventBus;
use aria_scheduler::Scheduler;
use aria_skills::SkillRegistry;
use aria_state_machine::StateMachine;

/// The central engine instance
pub struct Aria {
    /// Event bus for pub/sub communication
    pub bus: Arc<EventBus>,
    /// State machine for entity states
    pub states: Arc<StateMachine>,
    /// Background job scheduler
    pub scheduler: Arc<Scheduler>,
    /// Skill feature registry
    pub skills: Arc<SkillRegistry>,
    /// Automation handler
    pub automations: Arc<AutomationHandler>,
}

impl Aria {
    /// Build and wire a full engine from a config directory
    pub fn bootstrap(config_dir: &PathBuf) -> Result<Self> {
        let settings = Settings::load(config_dir)
            .with_context(|| format!("loading settings from {}", config_dir.display()))?;
        info!(name = %settings.name, workers = settings.workers, "Settings loaded");

        let rules_path = settings.rules_path(config_dir);
        let records = if rules_path.exists() {
            load_rules(&rules_path)
                .with_context(|| format!("loading rules from {}", rules_path.display()))?
        } else {
            info!(path = %rules_path.display(), "No rule file, starting without automations");
            Vec::new()
        };

        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateMachine::new(Arc::clone(&bus)));
        let scheduler = Arc::new(Scheduler::with_workers(settings.workers));
        let skills = Arc::new(SkillRegistry::new());

        let automations = AutomationHandler::new(
            parse_automations(&records),
            Arc::clone(&states),
            Arc::clone(&scheduler),
            Arc::clone(&skills),
        );
        automations.register_triggers();
        info!(
            automations = automations.automations().len(),
            jobs = scheduler.job_count(),
            "Automations registered"
        );

        Ok(Self {
            bus,
            states,
            scheduler,
            skills,
            automations,
        })
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config"));

    info!(config_dir = %config_dir.display(), "Starting Aria");
    let _aria = Aria::bootstrap(&config_dir)?;
    info!("Aria is running");

    // All the work happens on scheduler and listener threads
    loop {
        std::thread::park();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_bootstrap_from_empty_config_dir() {
        let dir = TempDir::new().unwrap();
        let aria = Aria::bootstrap(&dir.path().to_path_buf()).unwrap();
        assert!(aria.automations.automations().is_empty());
        assert_eq!(aria.scheduler.job_count(), 0);
    }

    #[test]
    fn test_bootstrap_loads_and_registers_rules() {
        let dir = TempDir::new().unwrap();
        let mut file = fs::File::create(dir.path().join("rules.yaml")).unwrap();
        file.write_all(
            br#"
- alias: heartbeat
  triggers:
    - type: interval
      minutes: 5
  actions: []
"#,
        )
        .unwrap();

        let aria = Aria::bootstrap(&dir.path().to_path_buf()).unwrap();
        assert_eq!(aria.automations.automations().len(), 1);
        assert_eq!(aria.scheduler.job_count(), 1);
        assert!(aria.scheduler.get_job("heartbeat/trigger-0").is_some());
    }
}
