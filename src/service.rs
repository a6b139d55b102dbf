//! Orchestrator Service (C9): the RPC-facing facade.
//!
//! Grounded on `services/workflow.rs::WorkflowServiceImpl` — a service
//! struct wrapping shared collaborators, spawning a run in the background
//! and streaming its progress back to the caller — generalized from that
//! file's single hard-coded `tokio::spawn` demo loop into §4.9's real
//! trigger/cancel/retry/list/get/subscribe surface over [`crate::executor`].
//! The proto-bound request/response types and the gRPC trait impl are not
//! carried over: this crate stops at the RPC surface itself (plain async
//! methods on a plain struct), leaving the wire binding to whatever
//! transport wraps it, per §6.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::adapter::ExecutorAdapter;
use crate::error::{OrchestratorError, Result};
use crate::events::ExecutionUpdateEvent;
use crate::executor::{CancellationToken, WorkflowExecutor};
use crate::model::{ExecutionProgress, ExecutionSummary, NodeStatus, WorkflowDefinition, WorkflowExecution};
use crate::persistence::ExecutionPersistence;

/// Capacity of the per-run broadcast fan-out; sized the same as the
/// executor's own event channel (see `executor.rs`).
const EVENT_FANOUT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TriggerOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RpcOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetryOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_execution_id: Option<String>,
    pub message: String,
}

/// Everything the service needs to know about a run still in flight:
/// enough to cancel it and enough to let late subscribers catch the rest
/// of its event stream.
struct LiveRun {
    cancellation: CancellationToken,
    events: broadcast::Sender<ExecutionUpdateEvent>,
}

/// Aggregates C1–C8/C10 behind the trigger/cancel/retry/list/get/subscribe
/// surface named in §6. Holds the workflow catalog in memory (it is
/// `orchestrator.workflows` from configuration, read once at startup — see
/// `config.rs`) and delegates everything about a specific run to
/// [`crate::executor::WorkflowExecutor`].
pub struct OrchestratorService {
    workflows: HashMap<String, WorkflowDefinition>,
    persistence: Arc<dyn ExecutionPersistence>,
    adapter: Arc<dyn ExecutorAdapter>,
    live: Arc<RwLock<HashMap<String, LiveRun>>>,
}

impl OrchestratorService {
    pub fn new(
        workflows: Vec<WorkflowDefinition>,
        persistence: Arc<dyn ExecutionPersistence>,
        adapter: Arc<dyn ExecutorAdapter>,
    ) -> Self {
        Self {
            workflows: workflows.into_iter().map(|w| (w.id.clone(), w)).collect(),
            persistence,
            adapter,
            live: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn list_workflows(&self) -> Vec<WorkflowSummary> {
        self.workflows
            .values()
            .map(|w| WorkflowSummary {
                id: w.id.clone(),
                name: w.name.clone(),
                description: w.description.clone(),
            })
            .collect()
    }

    pub fn get_workflow(&self, id: &str) -> Result<WorkflowDefinition> {
        self.workflows
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(format!("workflow {id}")))
    }

    /// Builds a fresh execution id, spawns the run in the background, and
    /// returns once it is scheduled — never once it finishes.
    pub async fn trigger_workflow(&self, workflow_id: &str) -> Result<TriggerOutcome> {
        let definition = match self.get_workflow(workflow_id) {
            Ok(def) => def,
            Err(err) => {
                return Ok(TriggerOutcome {
                    success: false,
                    execution_id: None,
                    message: err.to_string(),
                })
            }
        };

        let execution_id = Uuid::new_v4().to_string();
        self.spawn_run(definition, execution_id.clone(), false).await;

        Ok(TriggerOutcome {
            success: true,
            execution_id: Some(execution_id),
            message: "scheduled".to_string(),
        })
    }

    /// Best-effort cancellation per §5: flips the cancellation token a live
    /// run checks at its next layer boundary. A run already finished (or
    /// never started) is not an error, just a no-op reported as such.
    pub async fn cancel_execution(&self, execution_id: &str) -> Result<RpcOutcome> {
        let live = self.live.read().await;
        match live.get(execution_id) {
            Some(run) => {
                run.cancellation.cancel();
                Ok(RpcOutcome {
                    success: true,
                    message: "cancellation requested".to_string(),
                })
            }
            None => Ok(RpcOutcome {
                success: false,
                message: format!("execution {execution_id} is not live"),
            }),
        }
    }

    /// Per §4.9: loads the saved run, re-persists its state under a **new**
    /// execution id (so the new executor's own resume rehydration — keyed
    /// by its own id — has something to find), then resumes it.
    pub async fn retry_execution(&self, execution_id: &str) -> Result<RetryOutcome> {
        let saved = self
            .persistence
            .load_execution(execution_id)
            .await
            .map_err(OrchestratorError::from)?
            .ok_or_else(|| OrchestratorError::NotFound(format!("execution {execution_id}")))?;

        let new_execution_id = Uuid::new_v4().to_string();
        let carried = WorkflowExecution {
            execution_id: new_execution_id.clone(),
            workflow_id: saved.workflow_id.clone(),
            status: saved.status,
            started_at: saved.started_at,
            completed_at: saved.completed_at,
            node_states: saved.node_states,
            snapshot: saved.snapshot.clone(),
        };
        self.persistence
            .save_execution(&carried)
            .await
            .map_err(OrchestratorError::from)?;

        self.spawn_run(saved.snapshot, new_execution_id.clone(), true).await;

        Ok(RetryOutcome {
            success: true,
            new_execution_id: Some(new_execution_id),
            message: "resumed".to_string(),
        })
    }

    pub async fn list_executions(&self, workflow_id: &str, limit: u32) -> Result<Vec<ExecutionSummary>> {
        let runs = self
            .persistence
            .list_executions(workflow_id, limit)
            .await
            .map_err(OrchestratorError::from)?;
        Ok(runs.iter().map(Self::summarize).collect())
    }

    pub async fn get_execution(&self, execution_id: &str) -> Result<WorkflowExecution> {
        self.persistence
            .load_execution(execution_id)
            .await
            .map_err(OrchestratorError::from)?
            .ok_or_else(|| OrchestratorError::NotFound(format!("execution {execution_id}")))
    }

    /// Subscribes to a still-live run's event stream. A run that has
    /// already reached a terminal event (or never existed) has nothing
    /// left to fan out; callers after the fact should use
    /// [`Self::get_execution`] instead.
    pub async fn on_execution_update(
        &self,
        execution_id: &str,
    ) -> Result<Pin<Box<dyn Stream<Item = ExecutionUpdateEvent> + Send>>> {
        let live = self.live.read().await;
        let run = live
            .get(execution_id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("live execution {execution_id}")))?;
        let rx = run.events.subscribe();
        drop(live);

        let stream = BroadcastStream::new(rx).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                // A slow subscriber that falls behind the fan-out buffer
                // just misses the events it lagged on, same as any other
                // broadcast consumer; it still gets the terminal event.
                Err(broadcast::error::RecvError::Lagged(_)) => None,
            }
        });
        Ok(Box::pin(stream))
    }

    fn summarize(run: &WorkflowExecution) -> ExecutionSummary {
        let total = run.snapshot.nodes.len();
        let mut completed = 0;
        let mut failed = 0;
        let mut running = 0;
        for state in run.node_states.values() {
            match state.status {
                NodeStatus::Success | NodeStatus::Skipped => completed += 1,
                NodeStatus::Failed | NodeStatus::Cancelled => failed += 1,
                NodeStatus::Running => running += 1,
                NodeStatus::Pending => {}
            }
        }
        ExecutionSummary {
            execution_id: run.execution_id.clone(),
            workflow_id: run.workflow_id.clone(),
            status: run.status,
            started_at: run.started_at,
            completed_at: run.completed_at,
            progress: ExecutionProgress {
                total,
                completed,
                failed,
                running,
            },
        }
    }

    /// Registers the run in the live map, then drives it to completion in
    /// the background, pumping its private event channel into the shared
    /// broadcast fan-out until the terminal event passes through.
    async fn spawn_run(&self, snapshot: WorkflowDefinition, execution_id: String, resume: bool) {
        let (executor, mut rx) =
            WorkflowExecutor::new(snapshot, execution_id.clone(), self.adapter.clone(), self.persistence.clone());
        let (events_tx, _) = broadcast::channel(EVENT_FANOUT_CAPACITY);

        self.live.write().await.insert(
            execution_id.clone(),
            LiveRun {
                cancellation: executor.cancellation_token(),
                events: events_tx.clone(),
            },
        );

        let live = self.live.clone();
        tokio::spawn(async move {
            let run_fut = async {
                let _ = executor.execute(resume).await;
            };
            let pump_fut = async {
                while let Some(event) = rx.recv().await {
                    let terminal = event.is_terminal();
                    let _ = events_tx.send(event);
                    if terminal {
                        break;
                    }
                }
            };
            tokio::join!(run_fut, pump_fut);
            live.write().await.remove(&execution_id);
        });
    }
}
