//! Workflow Executor (C6): the DAG scheduler.
//!
//! Grounded on `execution/workflow_engine.rs::WorkflowExecutionEngine`'s
//! `execute_workflow_internal` — same overall shape (build a state record,
//! drive nodes forward, report status transitions to a stream handler) — but
//! generalized from its single-node-at-a-time `current_nodes` walk (which
//! has no barrier and silently skips nodes it has already executed) into the
//! layered, settled-barrier scheduler of §4.6: every node in a layer is
//! dispatched concurrently via [`futures::future::join_all`], the executor
//! waits for the whole layer to settle regardless of individual outcome, and
//! only then decides whether to continue, skip, or fail the run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;

use crate::adapter::ExecutorAdapter;
use crate::condition;
use crate::context::ExecutionContext;
use crate::error::{OrchestratorError, Result};
use crate::events::ExecutionUpdateEvent;
use crate::graph::GraphParser;
use crate::model::{
    ExecutionStatus, NodeExecutionResult, NodeKind, NodeStatus, WorkflowDefinition, WorkflowExecution,
};
use crate::persistence::ExecutionPersistence;
use crate::strategy::{run_with_strategy, StrategyConfig};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Best-effort cooperative cancellation, per §5: "cancelling a run is a
/// best-effort operation... a node currently in the adapter cannot be
/// preemptively killed". Checked only at layer boundaries.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct NodeOutcome {
    result: NodeExecutionResult,
    terminal_status: NodeStatus,
}

/// Drives one run of a [`WorkflowDefinition`] snapshot to completion.
///
/// Owns no shared mutable state beyond its own `ExecutionContext`: per §4.2
/// the context is exclusive to the executor that constructed it, so there is
/// nothing here an external caller should reach into except via the emitted
/// event stream and the persisted [`WorkflowExecution`] this returns.
pub struct WorkflowExecutor {
    execution_id: String,
    snapshot: WorkflowDefinition,
    adapter: Arc<dyn ExecutorAdapter>,
    persistence: Arc<dyn ExecutionPersistence>,
    events: mpsc::Sender<ExecutionUpdateEvent>,
    cancellation: CancellationToken,
}

impl WorkflowExecutor {
    /// Builds an executor and its event channel. The receiver is handed to
    /// whichever caller wants to observe `onExecutionUpdate` for this run
    /// (see [`crate::service::OrchestratorService`]); it is fine for nobody
    /// to ever poll it; `emit` degrades to a no-op send failure.
    pub fn new(
        snapshot: WorkflowDefinition,
        execution_id: impl Into<String>,
        adapter: Arc<dyn ExecutorAdapter>,
        persistence: Arc<dyn ExecutionPersistence>,
    ) -> (Self, mpsc::Receiver<ExecutionUpdateEvent>) {
        let (tx, rx) = mpsc::channel(256);
        (
            Self {
                execution_id: execution_id.into(),
                snapshot,
                adapter,
                persistence,
                events: tx,
                cancellation: CancellationToken::new(),
            },
            rx,
        )
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    fn emit(&self, event: ExecutionUpdateEvent) {
        if self.events.try_send(event).is_err() {
            tracing::debug!(execution_id = %self.execution_id, "no active subscriber for execution update");
        }
    }

    /// Runs §4.6's algorithm end to end.
    pub async fn execute(&self, resume: bool) -> Result<WorkflowExecution> {
        let plan = match GraphParser::new(&self.snapshot).parse() {
            Ok(plan) => plan,
            Err(err) => {
                let run = WorkflowExecution {
                    execution_id: self.execution_id.clone(),
                    workflow_id: self.snapshot.id.clone(),
                    status: ExecutionStatus::Failed,
                    started_at: now_ms(),
                    completed_at: Some(now_ms()),
                    node_states: HashMap::new(),
                    snapshot: self.snapshot.snapshot(),
                };
                self.persist_best_effort(&run).await;
                self.emit(ExecutionUpdateEvent::ExecutionFailed {
                    execution_id: self.execution_id.clone(),
                    message: err.to_string(),
                    timestamp: now_ms(),
                });
                return Err(err);
            }
        };

        let mut ctx = ExecutionContext::new(self.execution_id.clone());
        let started_at = self.rehydrate_if_resuming(resume, &mut ctx).await?;

        self.persist_run(&ctx, ExecutionStatus::Running, started_at, None)
            .await;

        let mut fatal: Option<String> = None;

        'layers: for layer in &plan.layers {
            if self.cancellation.is_cancelled() {
                fatal = Some("execution cancelled".to_string());
                break 'layers;
            }

            let runnable: Vec<&str> = layer
                .iter()
                .map(String::as_str)
                .filter(|id| !ctx.is_node_completed(id))
                .collect();
            if runnable.is_empty() {
                continue;
            }

            // Settled barrier: every node in the layer is awaited together,
            // regardless of individual outcome, before any decision is made.
            let outcomes =
                join_all(runnable.iter().copied().map(|node_id| self.run_node(node_id, &ctx))).await;

            let mut layer_fatal: Option<String> = None;
            for (node_id, outcome) in runnable.iter().copied().zip(outcomes.into_iter()) {
                ctx.record_result(node_id, outcome.result.clone());
                ctx.update_node_status(node_id, outcome.terminal_status);

                let event_node_state = ctx
                    .all_node_states()
                    .remove(node_id)
                    .expect("just recorded");

                if outcome.result.success {
                    self.emit(ExecutionUpdateEvent::NodeCompleted {
                        execution_id: self.execution_id.clone(),
                        node_id: node_id.to_string(),
                        node_state: event_node_state,
                        timestamp: now_ms(),
                    });
                } else {
                    self.emit(ExecutionUpdateEvent::NodeFailed {
                        execution_id: self.execution_id.clone(),
                        node_id: node_id.to_string(),
                        node_state: event_node_state,
                        timestamp: now_ms(),
                    });
                    if outcome.terminal_status == NodeStatus::Failed {
                        layer_fatal = Some(format!(
                            "node {} failed: {}",
                            node_id,
                            outcome.result.error.as_deref().unwrap_or("unknown error")
                        ));
                    }
                }
            }

            self.persist_run(&ctx, ExecutionStatus::Running, started_at, None).await;

            if let Some(message) = layer_fatal {
                fatal = Some(message);
                break 'layers;
            }
        }

        if let Some(message) = fatal {
            self.cancel_pending_nodes(&plan, &mut ctx);
            let completed_at = now_ms();
            self.persist_run(&ctx, ExecutionStatus::Failed, started_at, Some(completed_at))
                .await;
            self.emit(ExecutionUpdateEvent::ExecutionFailed {
                execution_id: self.execution_id.clone(),
                message: message.clone(),
                timestamp: completed_at,
            });
            return Ok(self.build_run(&ctx, ExecutionStatus::Failed, started_at, Some(completed_at)));
        }

        let completed_at = now_ms();
        self.persist_run(&ctx, ExecutionStatus::Success, started_at, Some(completed_at))
            .await;
        self.emit(ExecutionUpdateEvent::ExecutionCompleted {
            execution_id: self.execution_id.clone(),
            timestamp: completed_at,
        });
        Ok(self.build_run(&ctx, ExecutionStatus::Success, started_at, Some(completed_at)))
    }

    /// Resume rehydration per §4.6 step 2: terminal `success`/`skipped`
    /// nodes are carried forward as-is; a terminal `failed` node is folded
    /// back to pending so it is retried; anything else is simply absent,
    /// which the layer filter already treats as runnable.
    async fn rehydrate_if_resuming(&self, resume: bool, ctx: &mut ExecutionContext) -> Result<i64> {
        if !resume {
            return Ok(now_ms());
        }
        let prior = self
            .persistence
            .load_execution(&self.execution_id)
            .await
            .map_err(OrchestratorError::from)?;

        let Some(prior) = prior else {
            return Ok(now_ms());
        };

        for (node_id, state) in prior.node_states {
            if matches!(state.status, NodeStatus::Success | NodeStatus::Skipped) {
                ctx.ensure_node(&node_id);
                if let Some(result) = state.result {
                    ctx.record_result(&node_id, result);
                }
                ctx.update_node_status(&node_id, state.status);
            }
            // Failed/running/pending/cancelled nodes are left unrecorded so
            // the next layer pass treats them as runnable again.
        }
        Ok(prior.started_at)
    }

    async fn run_node(&self, node_id: &str, ctx: &ExecutionContext) -> NodeOutcome {
        self.emit(ExecutionUpdateEvent::NodeStarted {
            execution_id: self.execution_id.clone(),
            node_id: node_id.to_string(),
            timestamp: now_ms(),
        });

        let node = self
            .snapshot
            .node(node_id)
            .expect("plan only names nodes present in the snapshot it was parsed from");

        let result = match node.kind {
            NodeKind::Start | NodeKind::End | NodeKind::Parallel => {
                NodeExecutionResult::success(None, now_ms(), now_ms())
            }
            NodeKind::Condition => {
                let predecessor = self
                    .snapshot
                    .edges
                    .iter()
                    .find(|e| e.target == node_id)
                    .map(|e| e.source.as_str())
                    .unwrap_or(node_id);
                let expr = node.data.condition_expression.as_ref();
                let started_at = now_ms();
                let outcome = expr.map(|e| condition::evaluate(e, predecessor, ctx)).unwrap_or(false);
                NodeExecutionResult::success(
                    Some(serde_json::json!({ "conditionResult": outcome })),
                    started_at,
                    now_ms(),
                )
            }
            NodeKind::Task => {
                let config = StrategyConfig::new(
                    node_id,
                    node.data.retry_count,
                    node.data.timeout_ms,
                    node.data.skip_on_failure,
                );
                let task_type = node
                    .data
                    .task_type
                    .clone()
                    .expect("validated by the graph parser before any node is dispatched");
                let params = node.data.params.clone().unwrap_or_default();
                let adapter = self.adapter.clone();
                run_with_strategy(&config, move || {
                    let adapter = adapter.clone();
                    let node_id = node_id.to_string();
                    let task_type = task_type.clone();
                    let params = params.clone();
                    async move {
                        match adapter.execute_task_node(&node_id, &task_type, &params, ctx).await {
                            Ok(result) => result,
                            Err(err) => NodeExecutionResult::failure(err.to_string(), now_ms(), now_ms()),
                        }
                    }
                })
                .await
            }
            NodeKind::Script => {
                let config = StrategyConfig::new(
                    node_id,
                    node.data.retry_count,
                    node.data.timeout_ms,
                    node.data.skip_on_failure,
                );
                let script_code = node
                    .data
                    .script_code
                    .clone()
                    .expect("validated by the graph parser before any node is dispatched");
                let adapter = self.adapter.clone();
                run_with_strategy(&config, move || {
                    let adapter = adapter.clone();
                    let node_id = node_id.to_string();
                    let script_code = script_code.clone();
                    async move {
                        match adapter.execute_script_node(&node_id, &script_code, ctx).await {
                            Ok(result) => result,
                            Err(err) => NodeExecutionResult::failure(err.to_string(), now_ms(), now_ms()),
                        }
                    }
                })
                .await
            }
            NodeKind::Http => {
                let config = StrategyConfig::new(
                    node_id,
                    node.data.retry_count,
                    node.data.timeout_ms,
                    node.data.skip_on_failure,
                );
                let http_config = node
                    .data
                    .http_config
                    .clone()
                    .expect("validated by the graph parser before any node is dispatched");
                let adapter = self.adapter.clone();
                run_with_strategy(&config, move || {
                    let adapter = adapter.clone();
                    let node_id = node_id.to_string();
                    let http_config = http_config.clone();
                    async move {
                        match adapter.execute_http_node(&node_id, &http_config, ctx).await {
                            Ok(result) => result,
                            Err(err) => NodeExecutionResult::failure(err.to_string(), now_ms(), now_ms()),
                        }
                    }
                })
                .await
            }
        };

        let terminal_status = if result.success {
            NodeStatus::Success
        } else if node.data.skip_on_failure {
            NodeStatus::Skipped
        } else {
            NodeStatus::Failed
        };

        NodeOutcome { result, terminal_status }
    }

    fn cancel_pending_nodes(&self, plan: &crate::model::ExecutionPlan, ctx: &mut ExecutionContext) {
        for node_id in plan.all_nodes() {
            if !ctx.is_node_completed(node_id) {
                ctx.update_node_status(node_id, NodeStatus::Cancelled);
            }
        }
    }

    fn build_run(
        &self,
        ctx: &ExecutionContext,
        status: ExecutionStatus,
        started_at: i64,
        completed_at: Option<i64>,
    ) -> WorkflowExecution {
        WorkflowExecution {
            execution_id: self.execution_id.clone(),
            workflow_id: self.snapshot.id.clone(),
            status,
            started_at,
            completed_at,
            node_states: ctx.all_node_states(),
            snapshot: self.snapshot.snapshot(),
        }
    }

    async fn persist_run(
        &self,
        ctx: &ExecutionContext,
        status: ExecutionStatus,
        started_at: i64,
        completed_at: Option<i64>,
    ) {
        let run = self.build_run(ctx, status, started_at, completed_at);
        self.persist_best_effort(&run).await;
    }

    async fn persist_best_effort(&self, run: &WorkflowExecution) {
        if let Err(err) = self.persistence.save_execution(run).await {
            tracing::error!(
                execution_id = %self.execution_id,
                error = %err,
                "failed to persist execution state"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConditionExpression, WorkflowEdge, WorkflowNode};
    use crate::persistence::PersistenceResult;
    use async_trait::async_trait;
    use serde_json::Map;
    use std::sync::Mutex;
    use tokio::sync::Mutex as AsyncMutex;

    /// In-memory test double for `ExecutionPersistence`, following the
    /// teacher's preference for hand-rolled in-memory fakes in unit tests
    /// over mocking frameworks.
    #[derive(Default)]
    struct InMemoryPersistence {
        runs: AsyncMutex<HashMap<String, WorkflowExecution>>,
    }

    #[async_trait]
    impl ExecutionPersistence for InMemoryPersistence {
        async fn save_execution(&self, execution: &WorkflowExecution) -> PersistenceResult<()> {
            self.runs
                .lock()
                .await
                .insert(execution.execution_id.clone(), execution.clone());
            Ok(())
        }

        async fn load_execution(&self, execution_id: &str) -> PersistenceResult<Option<WorkflowExecution>> {
            Ok(self.runs.lock().await.get(execution_id).cloned())
        }

        async fn list_executions(
            &self,
            workflow_id: &str,
            limit: u32,
        ) -> PersistenceResult<Vec<WorkflowExecution>> {
            let runs = self.runs.lock().await;
            let mut matched: Vec<_> = runs
                .values()
                .filter(|r| r.workflow_id == workflow_id)
                .cloned()
                .collect();
            matched.sort_by_key(|r| std::cmp::Reverse(r.started_at));
            matched.truncate(limit as usize);
            Ok(matched)
        }

        async fn delete_execution(&self, execution_id: &str) -> PersistenceResult<()> {
            self.runs.lock().await.remove(execution_id);
            Ok(())
        }
    }

    /// Scriptable adapter: resolves per-`taskType` outcomes with an optional
    /// per-call artificial delay, and records invocation order/timestamps.
    struct ScriptedAdapter {
        outcomes: HashMap<String, (bool, u64)>,
        calls: Mutex<Vec<(String, String)>>,
        starts: Mutex<HashMap<String, i64>>,
        ends: Mutex<HashMap<String, i64>>,
    }

    impl ScriptedAdapter {
        fn new(outcomes: HashMap<String, (bool, u64)>) -> Self {
            Self {
                outcomes,
                calls: Mutex::new(Vec::new()),
                starts: Mutex::new(HashMap::new()),
                ends: Mutex::new(HashMap::new()),
            }
        }

        fn call_log(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExecutorAdapter for ScriptedAdapter {
        async fn execute_task_node(
            &self,
            node_id: &str,
            task_type: &str,
            _params: &Map<String, serde_json::Value>,
            _context: &ExecutionContext,
        ) -> Result<NodeExecutionResult> {
            self.calls
                .lock()
                .unwrap()
                .push((node_id.to_string(), task_type.to_string()));
            self.starts.lock().unwrap().insert(node_id.to_string(), now_ms());

            let (success, delay_ms) = self
                .outcomes
                .get(task_type)
                .copied()
                .unwrap_or((true, 0));
            if delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            }

            self.ends.lock().unwrap().insert(node_id.to_string(), now_ms());

            if success {
                Ok(NodeExecutionResult::success(None, now_ms(), now_ms()))
            } else {
                Ok(NodeExecutionResult::failure("mock", now_ms(), now_ms()))
            }
        }
    }

    fn node(id: &str, kind: NodeKind) -> WorkflowNode {
        WorkflowNode::new(id, kind)
    }

    fn def_with_nodes(nodes: Vec<WorkflowNode>, edges: Vec<WorkflowEdge>) -> WorkflowDefinition {
        WorkflowDefinition {
            id: "wf-1".into(),
            name: "test".into(),
            description: None,
            nodes,
            edges,
            viewport: None,
        }
    }

    #[tokio::test]
    async fn linear_run_succeeds() {
        let def = def_with_nodes(
            vec![
                node("start", NodeKind::Start),
                node("t1", NodeKind::Task).with_task_type("A"),
                node("t2", NodeKind::Task).with_task_type("B"),
                node("end", NodeKind::End),
            ],
            vec![
                WorkflowEdge::new("e1", "start", "t1"),
                WorkflowEdge::new("e2", "t1", "t2"),
                WorkflowEdge::new("e3", "t2", "end"),
            ],
        );
        let mut outcomes = HashMap::new();
        outcomes.insert("A".to_string(), (true, 0));
        outcomes.insert("B".to_string(), (true, 0));
        let adapter = Arc::new(ScriptedAdapter::new(outcomes));
        let persistence = Arc::new(InMemoryPersistence::default());

        let (executor, _rx) = WorkflowExecutor::new(def, "exec-1", adapter.clone(), persistence);
        let run = executor.execute(false).await.unwrap();

        assert_eq!(run.status, ExecutionStatus::Success);
        for id in ["start", "t1", "t2", "end"] {
            assert_eq!(run.node_states[id].status, NodeStatus::Success);
        }
        assert_eq!(
            adapter.call_log(),
            vec![("t1".to_string(), "A".to_string()), ("t2".to_string(), "B".to_string())]
        );
    }

    #[tokio::test]
    async fn parallel_fan_out_overlaps() {
        let def = def_with_nodes(
            vec![
                node("start", NodeKind::Start),
                node("t1", NodeKind::Task).with_task_type("A"),
                node("t2", NodeKind::Task).with_task_type("B"),
                node("end", NodeKind::End),
            ],
            vec![
                WorkflowEdge::new("e1", "start", "t1"),
                WorkflowEdge::new("e2", "start", "t2"),
                WorkflowEdge::new("e3", "t1", "end"),
                WorkflowEdge::new("e4", "t2", "end"),
            ],
        );
        let mut outcomes = HashMap::new();
        outcomes.insert("A".to_string(), (true, 80));
        outcomes.insert("B".to_string(), (true, 80));
        let adapter = Arc::new(ScriptedAdapter::new(outcomes));
        let persistence = Arc::new(InMemoryPersistence::default());

        let (executor, _rx) = WorkflowExecutor::new(def, "exec-1", adapter.clone(), persistence);
        let run = executor.execute(false).await.unwrap();

        assert_eq!(run.status, ExecutionStatus::Success);
        let starts = adapter.starts.lock().unwrap().clone();
        let ends = adapter.ends.lock().unwrap().clone();
        assert!(starts["t2"] < ends["t1"]);
        assert!(starts["t1"] < ends["t2"]);
    }

    #[tokio::test]
    async fn fail_stop_cancels_downstream() {
        let def = def_with_nodes(
            vec![
                node("start", NodeKind::Start),
                node("t1", NodeKind::Task).with_task_type("A"),
                node("t2", NodeKind::Task).with_task_type("B"),
                node("end", NodeKind::End),
            ],
            vec![
                WorkflowEdge::new("e1", "start", "t1"),
                WorkflowEdge::new("e2", "t1", "t2"),
                WorkflowEdge::new("e3", "t2", "end"),
            ],
        );
        let mut outcomes = HashMap::new();
        outcomes.insert("A".to_string(), (false, 0));
        outcomes.insert("B".to_string(), (true, 0));
        let adapter = Arc::new(ScriptedAdapter::new(outcomes));
        let persistence = Arc::new(InMemoryPersistence::default());

        let (executor, mut rx) = WorkflowExecutor::new(def, "exec-1", adapter, persistence);
        let run = executor.execute(false).await.unwrap();

        assert_eq!(run.status, ExecutionStatus::Failed);
        assert_eq!(run.node_states["t1"].status, NodeStatus::Failed);
        assert_eq!(run.node_states["t2"].status, NodeStatus::Cancelled);
        assert_eq!(run.node_states["end"].status, NodeStatus::Cancelled);

        let mut terminal_events = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ExecutionUpdateEvent::ExecutionFailed { .. }) {
                terminal_events += 1;
            }
            assert!(!matches!(event, ExecutionUpdateEvent::ExecutionCompleted { .. }));
        }
        assert_eq!(terminal_events, 1);
    }

    #[tokio::test]
    async fn skip_on_failure_continues() {
        let def = def_with_nodes(
            vec![
                node("start", NodeKind::Start),
                node("t1", NodeKind::Task).with_task_type("A").with_skip_on_failure(true),
                node("t2", NodeKind::Task).with_task_type("B"),
                node("end", NodeKind::End),
            ],
            vec![
                WorkflowEdge::new("e1", "start", "t1"),
                WorkflowEdge::new("e2", "t1", "t2"),
                WorkflowEdge::new("e3", "t2", "end"),
            ],
        );
        let mut outcomes = HashMap::new();
        outcomes.insert("A".to_string(), (false, 0));
        outcomes.insert("B".to_string(), (true, 0));
        let adapter = Arc::new(ScriptedAdapter::new(outcomes));
        let persistence = Arc::new(InMemoryPersistence::default());

        let (executor, _rx) = WorkflowExecutor::new(def, "exec-1", adapter, persistence);
        let run = executor.execute(false).await.unwrap();

        assert_eq!(run.status, ExecutionStatus::Success);
        assert_eq!(run.node_states["t1"].status, NodeStatus::Skipped);
        assert_eq!(run.node_states["t2"].status, NodeStatus::Success);
        assert_eq!(run.node_states["end"].status, NodeStatus::Success);
    }

    #[tokio::test]
    async fn resume_from_mid_failure_retries_only_the_failed_node() {
        let def = def_with_nodes(
            vec![
                node("start", NodeKind::Start),
                node("t1", NodeKind::Task).with_task_type("A"),
                node("t2", NodeKind::Task).with_task_type("B"),
                node("t3", NodeKind::Task).with_task_type("C"),
                node("end", NodeKind::End),
            ],
            vec![
                WorkflowEdge::new("e1", "start", "t1"),
                WorkflowEdge::new("e2", "t1", "t2"),
                WorkflowEdge::new("e3", "t2", "t3"),
                WorkflowEdge::new("e4", "t3", "end"),
            ],
        );
        let mut first_outcomes = HashMap::new();
        first_outcomes.insert("A".to_string(), (true, 0));
        first_outcomes.insert("B".to_string(), (false, 0));
        first_outcomes.insert("C".to_string(), (true, 0));
        let first_adapter = Arc::new(ScriptedAdapter::new(first_outcomes));
        let persistence = Arc::new(InMemoryPersistence::default());

        let (executor, _rx) =
            WorkflowExecutor::new(def.clone(), "exec-1", first_adapter, persistence.clone());
        let first_run = executor.execute(false).await.unwrap();
        assert_eq!(first_run.status, ExecutionStatus::Failed);
        assert_eq!(first_run.node_states["t1"].status, NodeStatus::Success);
        assert_eq!(first_run.node_states["t2"].status, NodeStatus::Failed);
        assert_eq!(first_run.node_states["t3"].status, NodeStatus::Cancelled);

        let mut second_outcomes = HashMap::new();
        second_outcomes.insert("A".to_string(), (true, 0));
        second_outcomes.insert("B".to_string(), (true, 0));
        second_outcomes.insert("C".to_string(), (true, 0));
        let second_adapter = Arc::new(ScriptedAdapter::new(second_outcomes));

        let (resumed, _rx) = WorkflowExecutor::new(def, "exec-1", second_adapter.clone(), persistence);
        let second_run = resumed.execute(true).await.unwrap();

        assert_eq!(second_run.status, ExecutionStatus::Success);
        assert_eq!(second_run.node_states.len(), 5);
        let called: Vec<&str> = second_adapter
            .call_log()
            .iter()
            .map(|(node_id, _)| node_id.as_str())
            .collect();
        assert!(!called.contains(&"t1"));
        assert!(called.contains(&"t2"));
        assert!(called.contains(&"t3"));
    }

    #[tokio::test]
    async fn condition_node_evaluates_against_predecessor() {
        let def = def_with_nodes(
            vec![
                node("start", NodeKind::Start),
                node("t1", NodeKind::Task).with_task_type("A"),
                node("cond", NodeKind::Condition)
                    .with_condition(ConditionExpression::PreviousNodeSuccess),
                node("end", NodeKind::End),
            ],
            vec![
                WorkflowEdge::new("e1", "start", "t1"),
                WorkflowEdge::new("e2", "t1", "cond"),
                WorkflowEdge::new("e3", "cond", "end"),
            ],
        );
        let mut outcomes = HashMap::new();
        outcomes.insert("A".to_string(), (true, 0));
        let adapter = Arc::new(ScriptedAdapter::new(outcomes));
        let persistence = Arc::new(InMemoryPersistence::default());

        let (executor, _rx) = WorkflowExecutor::new(def, "exec-1", adapter, persistence);
        let run = executor.execute(false).await.unwrap();

        assert_eq!(run.status, ExecutionStatus::Success);
        let cond_result = &run.node_states["cond"].result.as_ref().unwrap().output;
        assert_eq!(cond_result.as_ref().unwrap()["conditionResult"], true);
    }
}
