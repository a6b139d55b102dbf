//! Execution Persistence (C7): durable store for run headers + per-node
//! state.
//!
//! `PersistenceError`/`PersistenceResult` mirror `db/error.rs`'s
//! `DatabaseError`/`DbResult` split — a dedicated error type for the
//! storage layer with a `From<sqlx::Error>` conversion, kept separate from
//! the crate-wide `OrchestratorError` and folded in through one `#[from]`
//! arm (see `error.rs`).

pub mod sqlite;

use crate::model::WorkflowExecution;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence connection failed: {0}")]
    Connection(String),
    #[error("execution not found: {0}")]
    NotFound(String),
    #[error("persistence conflict: {0}")]
    Conflict(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("persistence error: {0}")]
    Other(String),
}

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => PersistenceError::NotFound("no matching row".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                PersistenceError::Conflict(db_err.to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                PersistenceError::Connection(err.to_string())
            }
            sqlx::Error::Migrate(e) => PersistenceError::Other(format!("migration failed: {e}")),
            other => PersistenceError::Other(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

/// Logical persistence contract for §4.7: upsert + load + list + delete.
/// Implementations must make `save_execution` atomic enough that a
/// concurrent `load_execution` never observes a partially-updated run.
#[async_trait]
pub trait ExecutionPersistence: Send + Sync {
    async fn save_execution(&self, execution: &WorkflowExecution) -> PersistenceResult<()>;
    async fn load_execution(&self, execution_id: &str) -> PersistenceResult<Option<WorkflowExecution>>;
    async fn list_executions(
        &self,
        workflow_id: &str,
        limit: u32,
    ) -> PersistenceResult<Vec<WorkflowExecution>>;
    async fn delete_execution(&self, execution_id: &str) -> PersistenceResult<()>;
}
