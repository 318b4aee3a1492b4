//! Configuration loading for the Aria automation engine
//!
//! Two files live in the config directory:
//!
//! - `settings.yaml` - engine settings (assistant name, rule file
//!   location, scheduler worker count); optional, defaults apply
//! - `rules.yaml` - the automation rules, loaded as raw records so the
//!   rule engine can skip malformed ones individually

mod error;
mod rules;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use rules::load_rules;
pub use settings::Settings;
