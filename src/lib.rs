//! Durable, event-driven DAG workflow orchestration engine.
//!
//! A trigger builds a fresh [`context::ExecutionContext`] and snapshot,
//! [`graph::GraphParser`] turns the workflow's nodes/edges into a layered
//! [`model::ExecutionPlan`], and [`executor::WorkflowExecutor`] drives that
//! plan layer by layer — each `task`/`script`/`http` node routed through
//! [`strategy`]'s retry/timeout wrapper to an [`adapter::ExecutorAdapter`]
//! (in this crate, [`dispatcher::DispatcherBridge`], an event-bus-backed
//! implementation), each `condition` node routed through the pure
//! evaluator in [`condition`]. Every state change is both persisted
//! ([`persistence`]) and emitted on the run's event stream
//! ([`events::ExecutionUpdateEvent`]). [`service::OrchestratorService`]
//! aggregates all of this behind the trigger/cancel/retry/list/get/
//! subscribe surface an external caller actually sees.

pub mod adapter;
pub mod bus;
pub mod condition;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod model;
pub mod persistence;
pub mod registry;
pub mod service;
pub mod strategy;

pub use adapter::ExecutorAdapter;
pub use bus::{CompleteTask, DispatchTask, EventBus};
pub use config::{load_config, OrchestratorConfig};
pub use context::ExecutionContext;
pub use dispatcher::DispatcherBridge;
pub use error::{OrchestratorError, Result};
pub use events::ExecutionUpdateEvent;
pub use executor::{CancellationToken, WorkflowExecutor};
pub use graph::GraphParser;
pub use model::{
    ConditionExpression, ExecutionPlan, ExecutionStatus, ExecutionSummary, HttpConfig, NodeData,
    NodeExecutionResult, NodeKind, NodeState, NodeStatus, WorkflowDefinition, WorkflowEdge, WorkflowExecution,
    WorkflowNode,
};
pub use persistence::sqlite::{DatabaseConnection, SqliteExecutionPersistence};
pub use persistence::{ExecutionPersistence, PersistenceError, PersistenceResult};
pub use registry::{TaskMetadata, TaskRegistry};
pub use service::{OrchestratorService, RetryOutcome, RpcOutcome, TriggerOutcome, WorkflowSummary};
