//! Assistant settings
//!
//! Parses settings.yaml from the config directory. Every field has a
//! default, and a missing settings file just means "all defaults", so a
//! fresh install starts without any configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};

/// Engine settings from settings.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Display name of the assistant
    #[serde(default = "default_name")]
    pub name: String,

    /// Rule file, relative to the config directory unless absolute
    #[serde(default = "default_rules_file")]
    pub rules_file: PathBuf,

    /// Scheduler worker pool size
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_name() -> String {
    "Aria".to_string()
}

fn default_rules_file() -> PathBuf {
    PathBuf::from("rules.yaml")
}

fn default_workers() -> usize {
    20
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: default_name(),
            rules_file: default_rules_file(),
            workers: default_workers(),
        }
    }
}

impl Settings {
    /// Load settings from `<config_dir>/settings.yaml`
    ///
    /// A missing file yields the defaults; a present but malformed file
    /// is an error.
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = config_dir.as_ref().join("settings.yaml");
        if !path.exists() {
            info!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        debug!(path = %path.display(), "Loading settings");
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
                path: path.clone(),
                source: e,
            })?;

        if settings.workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "workers".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(settings)
    }

    /// The rule file path resolved against the config directory
    pub fn rules_path(&self, config_dir: impl AsRef<Path>) -> PathBuf {
        if self.rules_file.is_absolute() {
            self.rules_file.clone()
        } else {
            config_dir.as_ref().join(&self.rules_file)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_missing_settings_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.name, "Aria");
        assert_eq!(settings.workers, 20);
        assert_eq!(settings.rules_file, PathBuf::from("rules.yaml"));
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "settings.yaml", "name: Jarvis\n");

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.name, "Jarvis");
        assert_eq!(settings.workers, 20);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "settings.yaml", "workers: 0\n");

        let result = Settings::load(dir.path());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_rules_path_resolution() {
        let settings = Settings::default();
        assert_eq!(
            settings.rules_path("/etc/aria"),
            PathBuf::from("/etc/aria/rules.yaml")
        );

        let settings = Settings {
            rules_file: PathBuf::from("/srv/rules.yaml"),
            ..Default::default()
        };
        assert_eq!(
            settings.rules_path("/etc/aria"),
            PathBuf::from("/srv/rules.yaml")
        );
    }

    #[test]
    fn test_malformed_settings_is_an_error() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "settings.yaml", "workers: [not a number\n");

        let result = Settings::load(dir.path());
        assert!(matches!(result, Err(ConfigError::ParseYaml { .. })));
    }
}
