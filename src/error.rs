//! Error taxonomy for the workflow orchestrator.
//!
//! Groups Validation, Runtime, Storage, and Protocol failures into a single
//! flat enum, the way `orchestrator::OrchestratorError` groups unrelated
//! failure modes behind one type rather than one enum per component.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    // --- Validation (C1 Graph Parser) ---
    #[error("edge {edge_id} references unknown node {node_id}")]
    EdgeRefsUnknownNode { edge_id: String, node_id: String },

    #[error("workflow has no start node")]
    MissingStart,

    #[error("workflow has {count} start nodes, expected exactly one")]
    DuplicateStart { count: usize },

    #[error("workflow has no end node")]
    MissingEnd,

    #[error("workflow has {count} end nodes, expected exactly one")]
    DuplicateEnd { count: usize },

    #[error("node {0} is unreachable from the start node")]
    Unreachable(String),

    #[error("workflow graph contains a cycle among nodes: {0:?}")]
    Cycle(Vec<String>),

    #[error("node {node_id} has unsupported kind {kind}")]
    UnsupportedNodeKind { node_id: String, kind: String },

    #[error("node {node_id} is missing required field {field}")]
    MissingRequiredNodeField { node_id: String, field: String },

    // --- Runtime (C4/C5/C6) ---
    #[error("node {node_id} timed out after {timeout_ms}ms")]
    NodeTimeout { node_id: String, timeout_ms: u64 },

    #[error("node {node_id} execution failed: {message}")]
    NodeExecutionFailed { node_id: String, message: String },

    #[error("adapter failure for node {node_id}: {message}")]
    AdapterFailure { node_id: String, message: String },

    #[error("unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("event bus timed out waiting for completion of {0}")]
    BusTimeout(String),

    // --- Storage (C7) ---
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("persistence conflict: {0}")]
    PersistenceConflict(String),

    // --- Protocol (C9) ---
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // --- ambient ---
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Persistence(#[from] crate::persistence::PersistenceError),
}

impl OrchestratorError {
    /// Whether this error kind belongs to the Validation family (C1).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrchestratorError::EdgeRefsUnknownNode { .. }
                | OrchestratorError::MissingStart
                | OrchestratorError::DuplicateStart { .. }
                | OrchestratorError::MissingEnd
                | OrchestratorError::DuplicateEnd { .. }
                | OrchestratorError::Unreachable(_)
                | OrchestratorError::Cycle(_)
                | OrchestratorError::UnsupportedNodeKind { .. }
                | OrchestratorError::MissingRequiredNodeField { .. }
        )
    }

    /// Whether the run should be considered fatal (vs. retried locally).
    pub fn is_fatal_to_run(&self) -> bool {
        self.is_validation()
            || matches!(
                self,
                OrchestratorError::UnknownTaskType(_) | OrchestratorError::PersistenceConflict(_)
            )
    }
}
