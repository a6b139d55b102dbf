//! SQLite-backed `ExecutionPersistence`.
//!
//! `DatabaseConnection`/`PoolStatistics` are adapted nearly verbatim from
//! `db/connection.rs`; the repository-of-static-async-fns pattern and the
//! ISO8601-string-timestamp convention for row models come from
//! `db/repositories/workflow_repo.rs` and `db/models/workflow.rs`. The
//! `snapshot_blob`/`result_blob` columns hold opaque JSON produced by
//! `serde_json`; round-trips are checked by value equality rather than
//! byte equality, since whitespace/key-order are not significant here
//! (see `tests::round_trip`).

use super::{ExecutionPersistence, PersistenceError, PersistenceResult};
use crate::model::{ExecutionStatus, NodeState, NodeStatus, WorkflowExecution};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub type DatabasePool = SqlitePool;

#[derive(Debug, Clone)]
pub struct PoolStatistics {
    pub idle_connections: u32,
    pub active_connections: u32,
    pub max_connections: u32,
    pub collected_at: u64,
}

#[derive(Clone)]
pub struct DatabaseConnection {
    pool: Arc<DatabasePool>,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::with_max_connections(database_url, 5).await
    }

    pub async fn with_max_connections(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await?;
        Ok(())
    }

    pub fn get_pool_statistics(&self) -> PoolStatistics {
        let pool_ref = self.pool.as_ref();
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let idle = pool_ref.num_idle() as u32;
        let total = pool_ref.size() as u32;
        PoolStatistics {
            idle_connections: idle,
            active_connections: total.saturating_sub(idle),
            max_connections: total,
            collected_at: now,
        }
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[derive(Debug, FromRow)]
struct ExecutionRow {
    execution_id: String,
    workflow_id: String,
    status: String,
    started_at: i64,
    completed_at: Option<i64>,
    snapshot_blob: String,
}

#[derive(Debug, FromRow)]
struct NodeStateRow {
    node_id: String,
    status: String,
    result_blob: Option<String>,
}

fn status_to_str(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Pending => "pending",
        ExecutionStatus::Running => "running",
        ExecutionStatus::Success => "success",
        ExecutionStatus::Failed => "failed",
        ExecutionStatus::Cancelled => "cancelled",
    }
}

fn status_from_str(s: &str) -> PersistenceResult<ExecutionStatus> {
    Ok(match s {
        "pending" => ExecutionStatus::Pending,
        "running" => ExecutionStatus::Running,
        "success" => ExecutionStatus::Success,
        "failed" => ExecutionStatus::Failed,
        "cancelled" => ExecutionStatus::Cancelled,
        other => return Err(PersistenceError::Other(format!("unknown execution status {other}"))),
    })
}

fn node_status_to_str(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Pending => "pending",
        NodeStatus::Running => "running",
        NodeStatus::Success => "success",
        NodeStatus::Failed => "failed",
        NodeStatus::Skipped => "skipped",
        NodeStatus::Cancelled => "cancelled",
    }
}

fn node_status_from_str(s: &str) -> PersistenceResult<NodeStatus> {
    Ok(match s {
        "pending" => NodeStatus::Pending,
        "running" => NodeStatus::Running,
        "success" => NodeStatus::Success,
        "failed" => NodeStatus::Failed,
        "skipped" => NodeStatus::Skipped,
        "cancelled" => NodeStatus::Cancelled,
        other => return Err(PersistenceError::Other(format!("unknown node status {other}"))),
    })
}

/// SQLite implementation of the Execution Persistence contract (C7).
pub struct SqliteExecutionPersistence {
    pool: DatabasePool,
}

impl SqliteExecutionPersistence {
    pub fn new(connection: &DatabaseConnection) -> Self {
        Self {
            pool: connection.pool().clone(),
        }
    }

    async fn load_node_states(&self, execution_id: &str) -> PersistenceResult<HashMap<String, NodeState>> {
        let rows = sqlx::query_as::<_, NodeStateRow>(
            "SELECT node_id, status, result_blob FROM node_states WHERE execution_id = ?",
        )
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await?;

        let mut states = HashMap::new();
        for row in rows {
            let result = match row.result_blob {
                Some(blob) => Some(serde_json::from_str(&blob)?),
                None => None,
            };
            states.insert(
                row.node_id.clone(),
                NodeState {
                    node_id: row.node_id,
                    status: node_status_from_str(&row.status)?,
                    result,
                },
            );
        }
        Ok(states)
    }
}

#[async_trait]
impl ExecutionPersistence for SqliteExecutionPersistence {
    async fn save_execution(&self, execution: &WorkflowExecution) -> PersistenceResult<()> {
        let now = Utc::now().to_rfc3339();
        let snapshot_blob = serde_json::to_string(&execution.snapshot)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO executions
                (execution_id, workflow_id, status, started_at, completed_at, snapshot_blob, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(execution_id) DO UPDATE SET
                status = excluded.status,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at",
        )
        .bind(&execution.execution_id)
        .bind(&execution.workflow_id)
        .bind(status_to_str(execution.status))
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(&snapshot_blob)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for state in execution.node_states.values() {
            let result_blob = match &state.result {
                Some(result) => Some(serde_json::to_string(result)?),
                None => None,
            };
            sqlx::query(
                "INSERT INTO node_states
                    (execution_id, node_id, status, result_blob, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(execution_id, node_id) DO UPDATE SET
                    status = excluded.status,
                    result_blob = excluded.result_blob,
                    updated_at = excluded.updated_at",
            )
            .bind(&execution.execution_id)
            .bind(&state.node_id)
            .bind(node_status_to_str(state.status))
            .bind(&result_blob)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_execution(&self, execution_id: &str) -> PersistenceResult<Option<WorkflowExecution>> {
        let row = sqlx::query_as::<_, ExecutionRow>(
            "SELECT execution_id, workflow_id, status, started_at, completed_at, snapshot_blob
             FROM executions WHERE execution_id = ?",
        )
        .bind(execution_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let node_states = self.load_node_states(execution_id).await?;
        Ok(Some(WorkflowExecution {
            execution_id: row.execution_id,
            workflow_id: row.workflow_id,
            status: status_from_str(&row.status)?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            node_states,
            snapshot: serde_json::from_str(&row.snapshot_blob)?,
        }))
    }

    async fn list_executions(
        &self,
        workflow_id: &str,
        limit: u32,
    ) -> PersistenceResult<Vec<WorkflowExecution>> {
        let rows = sqlx::query_as::<_, ExecutionRow>(
            "SELECT execution_id, workflow_id, status, started_at, completed_at, snapshot_blob
             FROM executions WHERE workflow_id = ? ORDER BY started_at DESC LIMIT ?",
        )
        .bind(workflow_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut executions = Vec::with_capacity(rows.len());
        for row in rows {
            let node_states = self.load_node_states(&row.execution_id).await?;
            executions.push(WorkflowExecution {
                execution_id: row.execution_id,
                workflow_id: row.workflow_id,
                status: status_from_str(&row.status)?,
                started_at: row.started_at,
                completed_at: row.completed_at,
                node_states,
                snapshot: serde_json::from_str(&row.snapshot_blob)?,
            });
        }
        Ok(executions)
    }

    async fn delete_execution(&self, execution_id: &str) -> PersistenceResult<()> {
        // SQLite only honors ON DELETE CASCADE when `PRAGMA foreign_keys`
        // is enabled on the connection; rather than depend on that pragma
        // being set, node_states are deleted explicitly in the same
        // transaction.
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM node_states WHERE execution_id = ?")
            .bind(execution_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM executions WHERE execution_id = ?")
            .bind(execution_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeExecutionResult, WorkflowDefinition};

    async fn setup() -> SqliteExecutionPersistence {
        let conn = DatabaseConnection::new("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE executions (
                execution_id TEXT PRIMARY KEY NOT NULL,
                workflow_id TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                completed_at INTEGER,
                snapshot_blob TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(conn.pool())
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE node_states (
                execution_id TEXT NOT NULL,
                node_id TEXT NOT NULL,
                status TEXT NOT NULL,
                result_blob TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (execution_id, node_id)
            )",
        )
        .execute(conn.pool())
        .await
        .unwrap();

        SqliteExecutionPersistence::new(&conn)
    }

    fn sample_execution() -> WorkflowExecution {
        let mut node_states = HashMap::new();
        node_states.insert(
            "t1".to_string(),
            NodeState {
                node_id: "t1".into(),
                status: NodeStatus::Success,
                result: Some(NodeExecutionResult::success(None, 0, 5)),
            },
        );
        WorkflowExecution {
            execution_id: "exec-1".into(),
            workflow_id: "wf-1".into(),
            status: ExecutionStatus::Running,
            started_at: 100,
            completed_at: None,
            node_states,
            snapshot: WorkflowDefinition {
                id: "wf-1".into(),
                name: "demo".into(),
                description: None,
                nodes: vec![],
                edges: vec![],
                viewport: None,
            },
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = setup().await;
        let execution = sample_execution();
        store.save_execution(&execution).await.unwrap();

        let loaded = store.load_execution("exec-1").await.unwrap().unwrap();
        assert_eq!(loaded.execution_id, execution.execution_id);
        assert_eq!(loaded.workflow_id, execution.workflow_id);
        assert_eq!(loaded.status, execution.status);
        assert_eq!(loaded.started_at, execution.started_at);
        assert_eq!(loaded.node_states, execution.node_states);
        assert_eq!(loaded.snapshot, execution.snapshot);
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let store = setup().await;
        let mut execution = sample_execution();
        store.save_execution(&execution).await.unwrap();

        execution.status = ExecutionStatus::Success;
        execution.completed_at = Some(200);
        store.save_execution(&execution).await.unwrap();

        let loaded = store.load_execution("exec-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, ExecutionStatus::Success);
        assert_eq!(loaded.completed_at, Some(200));
    }

    #[tokio::test]
    async fn load_missing_execution_returns_none() {
        let store = setup().await;
        assert!(store.load_execution("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_executions_orders_by_started_at_desc() {
        let store = setup().await;
        let mut e1 = sample_execution();
        e1.execution_id = "e1".into();
        e1.started_at = 100;
        let mut e2 = sample_execution();
        e2.execution_id = "e2".into();
        e2.started_at = 200;

        store.save_execution(&e1).await.unwrap();
        store.save_execution(&e2).await.unwrap();

        let listed = store.list_executions("wf-1", 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].execution_id, "e2");
        assert_eq!(listed[1].execution_id, "e1");
    }

    #[tokio::test]
    async fn delete_execution_removes_row() {
        let store = setup().await;
        let execution = sample_execution();
        store.save_execution(&execution).await.unwrap();
        store.delete_execution("exec-1").await.unwrap();

        assert!(store.load_execution("exec-1").await.unwrap().is_none());
    }
}
