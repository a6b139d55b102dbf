//! Ambient configuration: YAML loading with `$include` and `${ENV:default}`
//! expansion, deep-merged into an [`OrchestratorConfig`].
//!
//! Adapted near verbatim from `config/loader.rs`'s free functions
//! (`load_yaml_file`/`expand_env_in_string`/`deep_merge`/`yaml_to_json`) —
//! the include/env-expansion/deep-merge behavior this crate's config needs
//! is identical, only the deserialization target changes. The target
//! struct itself is new, shaped by §6's external-interfaces section rather
//! than by `config/workflow.rs`'s step-based `WorkflowConfig` (that struct
//! describes the pattern-routing domain this crate doesn't implement).

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use crate::error::{OrchestratorError, Result};
use crate::model::WorkflowDefinition;

/// Top-level configuration this crate consumes, per §6: `orchestrator.*`
/// plus `commonDatabase.dbBasePath`. `taskDefaults` is an open bag of
/// task-specific entries read by individual `generateDefaultParams`
/// callbacks (see `registry.rs`) — its shape is owned by whoever registers
/// a given `taskType`, not by this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub workflows: Vec<WorkflowDefinition>,
    #[serde(default = "default_pipeline_interval_minutes")]
    pub pipeline_interval_in_minutes: u64,
    pub common_database: DatabaseSection,
    #[serde(default)]
    pub task_defaults: serde_json::Map<String, serde_json::Value>,
}

fn default_pipeline_interval_minutes() -> u64 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSection {
    pub db_base_path: String,
}

impl OrchestratorConfig {
    /// The persistence store's file path per §6: one file named
    /// `synthos_workflow_executions` under `dbBasePath`.
    pub fn sqlite_path(&self) -> std::path::PathBuf {
        Path::new(&self.common_database.db_base_path).join("synthos_workflow_executions")
    }
}

/// Loads and parses a YAML file, resolving `$include` directives and
/// expanding `${ENV_VAR:default}` references before returning the raw tree.
pub fn load_yaml_file<P: AsRef<Path>>(path: P) -> Result<YamlValue> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| OrchestratorError::Config(format!("failed to read config file {path:?}: {e}")))?;

    let mut value: YamlValue = serde_yaml::from_str(&content)
        .map_err(|e| OrchestratorError::Config(format!("failed to parse config file {path:?}: {e}")))?;

    let base_dir = path
        .parent()
        .ok_or_else(|| OrchestratorError::Config("config path has no parent directory".to_string()))?;

    process_includes(&mut value, base_dir)?;
    expand_variables(&mut value);

    Ok(value)
}

/// Loads a YAML file and deserializes it into [`OrchestratorConfig`].
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<OrchestratorConfig> {
    let yaml = load_yaml_file(path)?;
    let json = yaml_to_json(&yaml)?;
    serde_json::from_value(json)
        .map_err(|e| OrchestratorError::Config(format!("failed to deserialize orchestrator config: {e}")))
}

fn process_includes(value: &mut YamlValue, base_dir: &Path) -> Result<()> {
    match value {
        YamlValue::Mapping(map) => {
            if let Some(YamlValue::String(include_path)) =
                map.get(&YamlValue::String("$include".to_string()))
            {
                let mut included = load_yaml_file(base_dir.join(include_path))?;

                // Sibling keys next to `$include` are overrides, deep-merged
                // on top of the included content rather than discarded.
                let mut overrides = map.clone();
                overrides.remove(&YamlValue::String("$include".to_string()));
                if !overrides.is_empty() {
                    deep_merge(&mut included, &YamlValue::Mapping(overrides));
                }

                *value = included;
                return Ok(());
            }
            for (_, v) in map.iter_mut() {
                process_includes(v, base_dir)?;
            }
        }
        YamlValue::Sequence(seq) => {
            for item in seq.iter_mut() {
                process_includes(item, base_dir)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn expand_variables(value: &mut YamlValue) {
    match value {
        YamlValue::String(s) => {
            if let Some(expanded) = expand_env_in_string(s) {
                *s = expanded;
            }
        }
        YamlValue::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                expand_variables(v);
            }
        }
        YamlValue::Sequence(seq) => {
            for item in seq.iter_mut() {
                expand_variables(item);
            }
        }
        _ => {}
    }
}

/// Expands `${ENV_VAR}` / `${ENV_VAR:default}` references in a string.
/// Returns `None` when the string has nothing to expand, so callers can
/// skip the allocation on the common case.
fn expand_env_in_string(s: &str) -> Option<String> {
    if !s.contains("${") {
        return None;
    }

    let re = regex::Regex::new(r"\$\{([^:}]+)(?::([^}]*))?\}").ok()?;
    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        let full_match = cap.get(0)?.as_str();
        let var_name = cap.get(1)?.as_str();
        let default_value = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        let value = env::var(var_name).unwrap_or_else(|_| default_value.to_string());
        result = result.replace(full_match, &value);
    }
    Some(result)
}

fn yaml_to_json(yaml: &YamlValue) -> Result<JsonValue> {
    match yaml {
        YamlValue::Null => Ok(JsonValue::Null),
        YamlValue::Bool(b) => Ok(JsonValue::Bool(*b)),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(JsonValue::Number(i.into()))
            } else if let Some(u) = n.as_u64() {
                Ok(JsonValue::Number(u.into()))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .ok_or_else(|| OrchestratorError::Config(format!("invalid number: {f}")))
            } else {
                Err(OrchestratorError::Config("invalid number".to_string()))
            }
        }
        YamlValue::String(s) => Ok(JsonValue::String(s.clone())),
        YamlValue::Sequence(seq) => {
            let json_seq: Result<Vec<JsonValue>> = seq.iter().map(yaml_to_json).collect();
            Ok(JsonValue::Array(json_seq?))
        }
        YamlValue::Mapping(map) => {
            let mut json_map = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    YamlValue::String(s) => s.clone(),
                    _ => return Err(OrchestratorError::Config("config map keys must be strings".to_string())),
                };
                json_map.insert(key, yaml_to_json(v)?);
            }
            Ok(JsonValue::Object(json_map))
        }
        YamlValue::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

/// Merges `other` into `base` in place. Objects merge key-by-key
/// recursively; any other pairing is a plain override. Used by
/// `process_includes` to apply sibling overrides on top of an `$include`.
fn deep_merge(base: &mut YamlValue, other: &YamlValue) {
    match (base, other) {
        (YamlValue::Mapping(base_map), YamlValue::Mapping(other_map)) => {
            for (key, other_value) in other_map {
                if let Some(base_value) = base_map.get_mut(key) {
                    deep_merge(base_value, other_value);
                } else {
                    base_map.insert(key.clone(), other_value.clone());
                }
            }
        }
        (base, other) => {
            *base = other.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn expand_env_in_string_uses_the_set_variable() {
        env::set_var("ORCH_TEST_VAR", "test_value");
        let result = expand_env_in_string("prefix ${ORCH_TEST_VAR} suffix");
        assert_eq!(result, Some("prefix test_value suffix".to_string()));
        env::remove_var("ORCH_TEST_VAR");
    }

    #[test]
    fn expand_env_in_string_falls_back_to_default() {
        let result = expand_env_in_string("${ORCH_MISSING_VAR:fallback}");
        assert_eq!(result, Some("fallback".to_string()));
    }

    #[test]
    fn deep_merge_overrides_leaves_and_preserves_untouched_keys() {
        let mut base: YamlValue = serde_yaml::from_str("a: 1\nb:\n  c: 2\n  d: 3\n").unwrap();
        let other: YamlValue = serde_yaml::from_str("b:\n  c: 20\n  e: 4\nf: 5\n").unwrap();
        deep_merge(&mut base, &other);

        let json = yaml_to_json(&base).unwrap();
        assert_eq!(json["a"], 1);
        assert_eq!(json["b"]["c"], 20);
        assert_eq!(json["b"]["d"], 3);
        assert_eq!(json["b"]["e"], 4);
        assert_eq!(json["f"], 5);
    }

    #[test]
    fn load_config_deserializes_workflows_and_db_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
workflows: []
pipelineIntervalInMinutes: 10
commonDatabase:
  dbBasePath: "${{ORCH_TEST_DB_DIR:/var/lib/orchestrator}}"
taskDefaults:
  ingest:
    batchSize: 100
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.pipeline_interval_in_minutes, 10);
        assert_eq!(config.common_database.db_base_path, "/var/lib/orchestrator");
        assert_eq!(config.task_defaults["ingest"]["batchSize"], 100);
        assert_eq!(config.sqlite_path().file_name().unwrap(), "synthos_workflow_executions");
    }

    #[test]
    fn load_config_resolves_include_directives() {
        let dir = tempfile::tempdir().unwrap();
        let included_path = dir.path().join("workflows.yaml");
        fs::write(&included_path, "[]\n").unwrap();

        let main_path = dir.path().join("main.yaml");
        fs::write(
            &main_path,
            r#"
workflows:
  $include: workflows.yaml
pipelineIntervalInMinutes: 5
commonDatabase:
  dbBasePath: "/tmp/orch"
"#,
        )
        .unwrap();

        let config = load_config(&main_path).unwrap();
        assert!(config.workflows.is_empty());
    }

    #[test]
    fn include_with_sibling_overrides_merges_instead_of_discarding_them() {
        let dir = tempfile::tempdir().unwrap();
        let included_path = dir.path().join("db.yaml");
        fs::write(&included_path, "dbBasePath: \"/var/lib/orchestrator\"\nextra: \"kept\"\n").unwrap();

        let main_path = dir.path().join("main.yaml");
        fs::write(
            &main_path,
            r#"
workflows: []
pipelineIntervalInMinutes: 5
commonDatabase:
  $include: db.yaml
  dbBasePath: "/tmp/override"
"#,
        )
        .unwrap();

        let config = load_config(&main_path).unwrap();
        assert_eq!(config.common_database.db_base_path, "/tmp/override");
    }
}
