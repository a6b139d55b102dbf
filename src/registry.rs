//! Task Registry (C10): catalog of known task kinds.
//!
//! Structurally the same as `pattern/registry.rs::PatternRegistry` — an
//! `Arc<RwLock<HashMap<..>>>` with register/get/list/remove/count — with
//! the pattern-YAML-loading methods dropped (task metadata here is
//! registered programmatically by the adapter owner, not loaded from
//! files) and a `generate_default_params` hook and schema validator added
//! per §4.10.

use crate::context::ExecutionContext;
use crate::error::{OrchestratorError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A pure function from `(context, config)` to a partial params mapping,
/// per §9's "registry of value objects ... each carrying ... a pure
/// function from (context, config) to a parameter mapping".
pub type DefaultParamsFn = Arc<dyn Fn(&ExecutionContext, &Value) -> Map<String, Value> + Send + Sync>;

#[derive(Clone)]
pub struct TaskMetadata {
    pub internal_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub params_schema: Value,
    default_params: Option<DefaultParamsFn>,
}

impl fmt::Debug for TaskMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskMetadata")
            .field("internal_name", &self.internal_name)
            .field("display_name", &self.display_name)
            .field("description", &self.description)
            .field("params_schema", &self.params_schema)
            .finish()
    }
}

impl TaskMetadata {
    pub fn new(internal_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            internal_name: internal_name.into(),
            display_name: display_name.into(),
            description: None,
            params_schema: Value::Object(Map::new()),
            default_params: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_params_schema(mut self, schema: Value) -> Self {
        self.params_schema = schema;
        self
    }

    pub fn with_default_params_fn(mut self, f: DefaultParamsFn) -> Self {
        self.default_params = Some(f);
        self
    }

    pub fn generate_default_params(&self, context: &ExecutionContext, config: &Value) -> Map<String, Value> {
        match &self.default_params {
            Some(f) => f(context, config),
            None => Map::new(),
        }
    }

    pub fn validate_params(&self, params: &Map<String, Value>) -> Result<()> {
        let instance = Value::Object(params.clone());
        match jsonschema::is_valid(&self.params_schema, &instance) {
            true => Ok(()),
            false => Err(OrchestratorError::InvalidRequest(format!(
                "params for task '{}' do not satisfy its schema",
                self.internal_name
            ))),
        }
    }
}

/// Thread-safe, process-wide catalog with at-most-once registration per
/// `internalName`.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<String, TaskMetadata>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, metadata: TaskMetadata) -> Result<()> {
        let mut tasks = self
            .tasks
            .write()
            .map_err(|e| OrchestratorError::Config(format!("registry lock poisoned: {e}")))?;

        if tasks.contains_key(&metadata.internal_name) {
            return Err(OrchestratorError::InvalidRequest(format!(
                "task type '{}' already registered",
                metadata.internal_name
            )));
        }
        tasks.insert(metadata.internal_name.clone(), metadata);
        Ok(())
    }

    pub fn get(&self, internal_name: &str) -> Result<Option<TaskMetadata>> {
        let tasks = self
            .tasks
            .read()
            .map_err(|e| OrchestratorError::Config(format!("registry lock poisoned: {e}")))?;
        Ok(tasks.get(internal_name).cloned())
    }

    pub fn list_all(&self) -> Result<Vec<TaskMetadata>> {
        let tasks = self
            .tasks
            .read()
            .map_err(|e| OrchestratorError::Config(format!("registry lock poisoned: {e}")))?;
        Ok(tasks.values().cloned().collect())
    }

    pub fn count(&self) -> Result<usize> {
        let tasks = self
            .tasks
            .read()
            .map_err(|e| OrchestratorError::Config(format!("registry lock poisoned: {e}")))?;
        Ok(tasks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_get_round_trip() {
        let registry = TaskRegistry::new();
        registry
            .register(TaskMetadata::new("ingest", "Ingest Data"))
            .unwrap();

        let fetched = registry.get("ingest").unwrap().unwrap();
        assert_eq!(fetched.display_name, "Ingest Data");
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = TaskRegistry::new();
        registry.register(TaskMetadata::new("ingest", "Ingest")).unwrap();
        let err = registry.register(TaskMetadata::new("ingest", "Ingest 2")).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidRequest(_)));
    }

    #[test]
    fn list_all_returns_every_registered_task() {
        let registry = TaskRegistry::new();
        registry.register(TaskMetadata::new("a", "A")).unwrap();
        registry.register(TaskMetadata::new("b", "B")).unwrap();
        assert_eq!(registry.count().unwrap(), 2);
        assert_eq!(registry.list_all().unwrap().len(), 2);
    }

    #[test]
    fn default_params_fn_is_invoked() {
        let metadata = TaskMetadata::new("ingest", "Ingest").with_default_params_fn(Arc::new(
            |_ctx, _config| {
                let mut map = Map::new();
                map.insert("batchSize".into(), Value::from(10));
                map
            },
        ));
        let ctx = ExecutionContext::new("exec-1");
        let params = metadata.generate_default_params(&ctx, &Value::Null);
        assert_eq!(params.get("batchSize"), Some(&Value::from(10)));
    }

    #[test]
    fn params_schema_validation_rejects_missing_required_field() {
        let schema = serde_json::json!({
            "type": "object",
            "required": ["url"],
            "properties": { "url": { "type": "string" } }
        });
        let metadata = TaskMetadata::new("http_call", "HTTP Call").with_params_schema(schema);

        let mut ok_params = Map::new();
        ok_params.insert("url".into(), Value::from("https://example.com"));
        assert!(metadata.validate_params(&ok_params).is_ok());

        let bad_params = Map::new();
        assert!(metadata.validate_params(&bad_params).is_err());
    }
}
