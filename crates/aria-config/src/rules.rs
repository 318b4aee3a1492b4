//! Rule file loading
//!
//! The rule file is a YAML list of automation records. Loading stops at
//! the record level: records come back as raw JSON values so the rule
//! engine can apply its own per-record lenience when parsing them.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Load the rule file as a list of raw automation records
///
/// Accepts either a top-level list or a mapping with an `automations:`
/// list, so rules can live alone in their own file or inside a larger
/// config document.
pub fn load_rules(path: impl AsRef<Path>) -> ConfigResult<Vec<serde_json::Value>> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading rule file");

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_rules(&content, path)
}

fn parse_rules(content: &str, path: &Path) -> ConfigResult<Vec<serde_json::Value>> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })?;

    let list = match yaml {
        serde_yaml::Value::Sequence(seq) => seq,
        serde_yaml::Value::Mapping(mut map) => match map.remove("automations") {
            Some(serde_yaml::Value::Sequence(seq)) => seq,
            Some(_) => {
                return Err(ConfigError::InvalidValue {
                    key: "automations".to_string(),
                    reason: "must be a list".to_string(),
                })
            }
            None => Vec::new(),
        },
        serde_yaml::Value::Null => Vec::new(),
        _ => {
            return Err(ConfigError::InvalidValue {
                key: "root".to_string(),
                reason: "rule file must be a list or a mapping".to_string(),
            })
        }
    };

    list.into_iter()
        .map(|record| {
            serde_json::to_value(&record).map_err(|e| ConfigError::InvalidValue {
                key: "automations".to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_rules(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.yaml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_top_level_list() {
        let (_dir, path) = write_rules(
            r#"
- alias: evening_lights
  triggers:
    - type: state
      entity_id: presence
  actions:
    - action: change_state
      entity_id: light
      state: "on"
"#,
        );

        let records = load_rules(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["alias"], "evening_lights");
        assert_eq!(records[0]["triggers"][0]["type"], "state");
    }

    #[test]
    fn test_load_automations_key() {
        let (_dir, path) = write_rules(
            r#"
automations:
  - alias: one
  - alias: two
"#,
        );

        let records = load_rules(&path).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_empty_file_is_no_rules() {
        let (_dir, path) = write_rules("");
        assert!(load_rules(&path).unwrap().is_empty());
    }

    #[test]
    fn test_scalar_root_rejected() {
        let (_dir, path) = write_rules("just a string\n");
        assert!(matches!(
            load_rules(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = load_rules(dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
