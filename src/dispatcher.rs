//! Dispatcher Bridge (C8): the event-driven `ExecutorAdapter`.
//!
//! The struct shape (holding the collaborators it bridges between) follows
//! `integration/bridge.rs::PatternToolBridge`; the actual dispatch/complete
//! protocol and its "subscribe fresh every call, unsubscribe on every exit
//! path" discipline are new, built to close the subscription-leak risk the
//! spec calls out explicitly in its design notes (§9) — dropping the
//! `broadcast::Receiver` returned by `EventBus::subscribe_complete` is what
//! "unsubscribe" means for a broadcast channel, so it happens unconditionally
//! via the receiver going out of scope, on every branch below, not just the
//! success path.

use crate::adapter::ExecutorAdapter;
use crate::bus::{CompleteTask, DispatchTask, EventBus};
use crate::context::ExecutionContext;
use crate::error::{OrchestratorError, Result};
use crate::model::NodeExecutionResult;
use crate::registry::TaskRegistry;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::sync::broadcast;

/// Default task completion timeout: 90 minutes, per §4.8/§6.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(90 * 60);

pub struct DispatcherBridge {
    bus: EventBus,
    registry: TaskRegistry,
    task_timeout: Duration,
    /// `taskDefaults` from configuration (§6), handed to each task's
    /// `generateDefaultParams(context, config)` as its `config` argument.
    task_defaults_config: Value,
}

impl DispatcherBridge {
    pub fn new(bus: EventBus, registry: TaskRegistry) -> Self {
        Self {
            bus,
            registry,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            task_defaults_config: Value::Null,
        }
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Supplies the `taskDefaults` configuration section so default-params
    /// generators see the same config a caller loading `orchestrator.yaml`
    /// would have (see `config::OrchestratorConfig::task_defaults`).
    pub fn with_task_defaults_config(mut self, config: Value) -> Self {
        self.task_defaults_config = config;
        self
    }

    fn merge_params(
        default_params: Map<String, Value>,
        caller_params: &Map<String, Value>,
    ) -> Map<String, Value> {
        let mut merged = default_params;
        for (key, value) in caller_params {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    async fn await_matching_completion(
        mut rx: broadcast::Receiver<CompleteTask>,
        internal_name: &str,
        timeout: Duration,
    ) -> Option<CompleteTask> {
        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(task) if task.metadata.internal_name == internal_name => return Some(task),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        };
        // `rx` is dropped (unsubscribed) when this function returns,
        // regardless of which branch below fires.
        tokio::time::timeout(timeout, wait).await.unwrap_or(None)
    }
}

#[async_trait]
impl ExecutorAdapter for DispatcherBridge {
    async fn execute_task_node(
        &self,
        node_id: &str,
        task_type: &str,
        params: &Map<String, Value>,
        context: &ExecutionContext,
    ) -> Result<NodeExecutionResult> {
        let metadata = self
            .registry
            .get(task_type)?
            .ok_or_else(|| OrchestratorError::UnknownTaskType(task_type.to_string()))?;

        let default_params = metadata.generate_default_params(context, &self.task_defaults_config);
        let resolved_params = Self::merge_params(default_params, params);

        let started_at = chrono::Utc::now().timestamp_millis();

        // Subscribe before publishing so a fast external runtime can never
        // complete the task before we start listening.
        let complete_rx = self.bus.subscribe_complete();
        self.bus.publish_dispatch(DispatchTask {
            metadata: metadata.clone(),
            params: resolved_params.clone(),
        });

        let outcome =
            Self::await_matching_completion(complete_rx, &metadata.internal_name, self.task_timeout).await;

        let completed_at = chrono::Utc::now().timestamp_millis();

        match outcome {
            Some(_matched) => Ok(NodeExecutionResult::success(
                Some(serde_json::json!({
                    "taskType": task_type,
                    "resolvedParams": resolved_params,
                })),
                started_at,
                completed_at,
            )),
            None => {
                tracing::warn!(node_id, task_type, "dispatcher bridge timed out waiting for CompleteTask");
                Ok(NodeExecutionResult::failure(
                    format!(
                        "timed out after {}s waiting for task '{}' to complete",
                        self.task_timeout.as_secs(),
                        task_type
                    ),
                    started_at,
                    completed_at,
                ))
            }
        }
    }
}
