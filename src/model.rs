//! Core data model: workflow definitions, nodes, edges, execution state.
//!
//! Grounded on `db/models/workflow.rs`'s builder-method style and
//! `execution/workflow_engine.rs`'s `WorkflowNode`/`WorkflowEdge` shape,
//! generalized to the full node-kind and condition vocabulary named by the
//! spec's data model section.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A declarative workflow: nodes + edges. Immutable once referenced by a
/// run; runs keep their own deep-copied snapshot (see [`crate::executor`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<serde_json::Value>,
}

impl WorkflowDefinition {
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// By-value deep copy, taken at run start to produce a run's snapshot.
    /// `WorkflowDefinition` is already plain owned data, so `clone()` *is*
    /// the deep copy; this method exists to name the operation explicitly
    /// at call sites rather than leaving a bare `.clone()`.
    pub fn snapshot(&self) -> WorkflowDefinition {
        self.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Start,
    End,
    Task,
    Condition,
    Parallel,
    Script,
    Http,
}

/// A node's recognized `data` bag. Which fields are meaningful depends on
/// `kind`; all are optional here because a `start` node, for instance, uses
/// none of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub skip_on_failure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<ConditionExpression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub data: NodeData,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            data: NodeData::default(),
        }
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.data.task_type = Some(task_type.into());
        self
    }

    pub fn with_skip_on_failure(mut self, skip: bool) -> Self {
        self.data.skip_on_failure = skip;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.data.retry_count = retry_count;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.data.timeout_ms = timeout_ms;
        self
    }

    pub fn with_condition(mut self, expr: ConditionExpression) -> Self {
        self.data.condition_expression = Some(expr);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl WorkflowEdge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            label: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConditionExpression {
    PreviousNodeSuccess,
    PreviousNodeFailed,
    KeyValueMatch {
        key_path: String,
        expected_value: serde_json::Value,
    },
    /// Reserved: never truthfully evaluated. See [`crate::condition`].
    CustomExpression { code: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
    Cancelled,
}

impl NodeStatus {
    /// Terminal statuses for a node, per the glossary.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeStatus::Success | NodeStatus::Failed | NodeStatus::Skipped | NodeStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeState {
    pub node_id: String,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<NodeExecutionResult>,
}

impl NodeState {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Pending,
            result: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: i64,
    pub completed_at: i64,
}

impl NodeExecutionResult {
    pub fn success(output: Option<serde_json::Value>, started_at: i64, completed_at: i64) -> Self {
        Self {
            success: true,
            output,
            error: None,
            started_at,
            completed_at,
        }
    }

    pub fn failure(error: impl Into<String>, started_at: i64, completed_at: i64) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            started_at,
            completed_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// A run: the mutable record the Workflow Executor (C6) owns until terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowExecution {
    pub execution_id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    pub node_states: HashMap<String, NodeState>,
    pub snapshot: WorkflowDefinition,
}

/// The output of the Graph Parser (C1): a read-only layered execution plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    /// Ordered layers; each is an ordered set of node ids safe to run
    /// concurrently once their predecessors are terminal.
    pub layers: Vec<Vec<String>>,
    /// Fan-out nodes (out-degree > 1) mapped to their successor ids.
    pub parallel_branches: HashMap<String, Vec<String>>,
    /// Nodes with in-degree > 1.
    pub convergence_points: std::collections::HashSet<String>,
}

impl ExecutionPlan {
    /// All node ids covered by the plan, in layer order.
    pub fn all_nodes(&self) -> Vec<&str> {
        self.layers.iter().flatten().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub running: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    pub progress: ExecutionProgress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_builder_methods_compose() {
        let node = WorkflowNode::new("t1", NodeKind::Task)
            .with_task_type("ingest")
            .with_retry_count(2)
            .with_timeout_ms(5000)
            .with_skip_on_failure(true);

        assert_eq!(node.data.task_type.as_deref(), Some("ingest"));
        assert_eq!(node.data.retry_count, 2);
        assert_eq!(node.data.timeout_ms, 5000);
        assert!(node.data.skip_on_failure);
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let def = WorkflowDefinition {
            id: "wf-1".into(),
            name: "demo".into(),
            description: None,
            nodes: vec![WorkflowNode::new("start", NodeKind::Start)],
            edges: vec![],
            viewport: None,
        };
        let mut snap = def.snapshot();
        snap.nodes.push(WorkflowNode::new("end", NodeKind::End));

        assert_eq!(def.nodes.len(), 1);
        assert_eq!(snap.nodes.len(), 2);
    }

    #[test]
    fn node_status_terminality() {
        assert!(NodeStatus::Success.is_terminal());
        assert!(NodeStatus::Skipped.is_terminal());
        assert!(!NodeStatus::Running.is_terminal());
        assert!(!NodeStatus::Pending.is_terminal());
    }

    #[test]
    fn condition_expression_round_trips_through_json() {
        let expr = ConditionExpression::KeyValueMatch {
            key_path: "t1.output.status".into(),
            expected_value: serde_json::json!("ok"),
        };
        let json = serde_json::to_string(&expr).unwrap();
        let back: ConditionExpression = serde_json::from_str(&json).unwrap();
        assert_eq!(expr, back);
    }
}
