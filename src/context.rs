//! Execution Context (C2): the per-run in-memory state.
//!
//! Grounded on `execution/workflow_engine.rs::WorkflowExecutionState` and
//! `config/workflow.rs::WorkflowState`, generalized from a single
//! `current_node`/`step` cursor to the full per-node status/result maps the
//! spec requires, plus the serialize/deserialize round-trip persistence
//! needs.

use crate::model::{NodeExecutionResult, NodeState, NodeStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Structurally-cloneable view of a context, used to round-trip through
/// persistence (see [`crate::persistence`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContextSnapshot {
    pub node_results: HashMap<String, NodeExecutionResult>,
    pub node_states: HashMap<String, NodeState>,
    pub global_vars: HashMap<String, serde_json::Value>,
}

/// Single-writer, multi-reader per-run state. The Workflow Executor is the
/// only writer for its run; readers (condition evaluator, strategy, event
/// emitter) never mutate it. Per §4.2, no locking is required as long as
/// all mutation stays on the scheduler's driving task.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub execution_id: String,
    node_results: HashMap<String, NodeExecutionResult>,
    node_states: HashMap<String, NodeState>,
    global_vars: HashMap<String, serde_json::Value>,
}

impl ExecutionContext {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            node_results: HashMap::new(),
            node_states: HashMap::new(),
            global_vars: HashMap::new(),
        }
    }

    pub fn ensure_node(&mut self, node_id: &str) {
        self.node_states
            .entry(node_id.to_string())
            .or_insert_with(|| NodeState::new(node_id));
    }

    pub fn update_node_status(&mut self, node_id: &str, status: NodeStatus) {
        self.ensure_node(node_id);
        if let Some(state) = self.node_states.get_mut(node_id) {
            state.status = status;
        }
    }

    pub fn record_result(&mut self, node_id: &str, result: NodeExecutionResult) {
        self.ensure_node(node_id);
        let status = if result.success {
            NodeStatus::Success
        } else {
            NodeStatus::Failed
        };
        if let Some(state) = self.node_states.get_mut(node_id) {
            state.status = status;
            state.result = Some(result.clone());
        }
        self.node_results.insert(node_id.to_string(), result);
    }

    pub fn node_status(&self, node_id: &str) -> Option<NodeStatus> {
        self.node_states.get(node_id).map(|s| s.status)
    }

    pub fn is_node_success(&self, node_id: &str) -> bool {
        self.node_status(node_id) == Some(NodeStatus::Success)
    }

    pub fn is_node_failed(&self, node_id: &str) -> bool {
        self.node_status(node_id) == Some(NodeStatus::Failed)
    }

    pub fn is_node_completed(&self, node_id: &str) -> bool {
        self.node_status(node_id).map(NodeStatus::is_terminal).unwrap_or(false)
    }

    pub fn node_result(&self, node_id: &str) -> Option<&NodeExecutionResult> {
        self.node_results.get(node_id)
    }

    /// Navigates `output`/nested mapping values of an upstream node's
    /// result. Used by the Condition Evaluator's `keyValueMatch`.
    pub fn get_upstream_output(&self, node_id: &str, path: &[&str]) -> Option<serde_json::Value> {
        let result = self.node_results.get(node_id)?;
        let mut current = result.output.clone()?;
        for segment in path {
            current = current.as_object()?.get(*segment)?.clone();
        }
        Some(current)
    }

    pub fn set_global(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.global_vars.insert(key.into(), value);
    }

    pub fn get_global(&self, key: &str) -> Option<&serde_json::Value> {
        self.global_vars.get(key)
    }

    /// Defensive copy of the node-state map, per §4.2.
    pub fn all_node_states(&self) -> HashMap<String, NodeState> {
        self.node_states.clone()
    }

    pub fn serialize(&self) -> ContextSnapshot {
        ContextSnapshot {
            node_results: self.node_results.clone(),
            node_states: self.node_states.clone(),
            global_vars: self.global_vars.clone(),
        }
    }

    pub fn restore(execution_id: impl Into<String>, snapshot: ContextSnapshot) -> Self {
        Self {
            execution_id: execution_id.into(),
            node_results: snapshot.node_results,
            node_states: snapshot.node_states,
            global_vars: snapshot.global_vars,
        }
    }
}
