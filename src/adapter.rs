//! Executor Adapter (C5): the boundary to out-of-process task execution.
//!
//! The `#[async_trait]` boundary-object shape follows `orchestrator::TaskExecutor`
//! (an async trait implemented by whatever runtime actually performs work,
//! injected into the scheduler rather than resolved globally).

use crate::context::ExecutionContext;
use crate::error::{OrchestratorError, Result};
use crate::model::{HttpConfig, NodeExecutionResult};
use async_trait::async_trait;
use serde_json::Map;

/// Boundary to out-of-process task execution. Implementations must be
/// re-entrant: several task nodes from one run may call `execute_task_node`
/// concurrently. Adapters must not mutate `context` except through its
/// documented setters, and should not themselves enforce timeouts — that is
/// the Strategy's (C4) job.
#[async_trait]
pub trait ExecutorAdapter: Send + Sync {
    async fn execute_task_node(
        &self,
        node_id: &str,
        task_type: &str,
        params: &Map<String, serde_json::Value>,
        context: &ExecutionContext,
    ) -> Result<NodeExecutionResult>;

    /// Optional extension for `script` nodes. Adapters that do not support
    /// script execution must fail fast with `UnsupportedNodeKind`.
    async fn execute_script_node(
        &self,
        node_id: &str,
        _script_code: &str,
        _context: &ExecutionContext,
    ) -> Result<NodeExecutionResult> {
        Err(OrchestratorError::UnsupportedNodeKind {
            node_id: node_id.to_string(),
            kind: "script".to_string(),
        })
    }

    /// Optional extension for `http` nodes. Adapters that do not support
    /// HTTP execution must fail fast with `UnsupportedNodeKind`.
    async fn execute_http_node(
        &self,
        node_id: &str,
        _http_config: &HttpConfig,
        _context: &ExecutionContext,
    ) -> Result<NodeExecutionResult> {
        Err(OrchestratorError::UnsupportedNodeKind {
            node_id: node_id.to_string(),
            kind: "http".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TaskOnlyAdapter;

    #[async_trait]
    impl ExecutorAdapter for TaskOnlyAdapter {
        async fn execute_task_node(
            &self,
            _node_id: &str,
            _task_type: &str,
            _params: &Map<String, serde_json::Value>,
            _context: &ExecutionContext,
        ) -> Result<NodeExecutionResult> {
            Ok(NodeExecutionResult::success(None, 0, 1))
        }
    }

    #[tokio::test]
    async fn default_script_and_http_fail_fast() {
        let adapter = TaskOnlyAdapter;
        let ctx = ExecutionContext::new("exec-1");

        let err = adapter
            .execute_script_node("n1", "print('hi')", &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::UnsupportedNodeKind { .. }));

        let http = HttpConfig {
            url: "https://example.com".into(),
            method: crate::model::HttpMethod::Get,
            headers: None,
            body: None,
        };
        let err = adapter.execute_http_node("n1", &http, &ctx).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::UnsupportedNodeKind { .. }));
    }
}
