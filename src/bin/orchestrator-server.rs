//! Orchestrator server process entry point.
//!
//! Wires configuration, the SQLite persistence store, and the in-process
//! dispatcher bridge into an [`OrchestratorService`], then idles. This
//! crate's external surface (§6 "trigger/cancel/retry/list/get/subscribe")
//! is a plain async facade with no wire transport bound to it yet — `tonic`
//! and `prost` are retained in `Cargo.toml` for that future binding layer,
//! not used here — so this binary's job ends at composite-root wiring and
//! readiness, plus picking up `SIGTERM`/Ctrl-C to shut the process down
//! cleanly once a transport is attached in front of it.

use std::env;
use std::sync::Arc;

use synthos_orchestrator::persistence::sqlite::{DatabaseConnection, SqliteExecutionPersistence};
use synthos_orchestrator::{config, DispatcherBridge, EventBus, OrchestratorService, TaskRegistry};

const DEFAULT_CONFIG_PATH: &str = "config/orchestrator.yaml";
const DEFAULT_BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    tracing::info!(path = %config_path, "loading orchestrator configuration");
    let cfg = config::load_config(&config_path).map_err(|e| {
        tracing::error!(error = %e, "failed to load configuration; set CONFIG_PATH or place {DEFAULT_CONFIG_PATH}");
        e
    })?;

    let db_path = cfg.sqlite_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let database_url = format!("sqlite://{}?mode=rwc", db_path.display());

    tracing::info!(url = %database_url, "connecting to execution store");
    let connection = DatabaseConnection::new(&database_url).await?;
    connection.run_migrations().await?;
    let persistence: Arc<dyn synthos_orchestrator::ExecutionPersistence> =
        Arc::new(SqliteExecutionPersistence::new(&connection));

    // The task registry starts empty: registering `taskType`s is the
    // embedding deployment's job (see `registry.rs`), not this binary's.
    let registry = TaskRegistry::new();
    let bus = EventBus::new(DEFAULT_BUS_CAPACITY);
    let task_defaults_config = serde_json::Value::Object(cfg.task_defaults.clone());
    let adapter: Arc<dyn synthos_orchestrator::ExecutorAdapter> = Arc::new(
        DispatcherBridge::new(bus, registry).with_task_defaults_config(task_defaults_config),
    );

    let workflow_count = cfg.workflows.len();
    // Held for its lifetime: no transport is wired up yet to drive it, but
    // constructing it is what exercises the config → persistence → adapter
    // wiring this binary exists to prove.
    let _service = OrchestratorService::new(cfg.workflows, persistence, adapter);

    tracing::info!(
        workflows = workflow_count,
        pipeline_interval_minutes = cfg.pipeline_interval_in_minutes,
        "orchestrator service ready"
    );

    shutdown_signal().await;
    tracing::info!("orchestrator server shutting down");
    Ok(())
}

/// Waits for Ctrl-C or, on unix, `SIGTERM`.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL-C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received CTRL-C signal");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM signal");
        }
    }
}
