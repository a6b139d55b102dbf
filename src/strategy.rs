//! Node Strategy (C4): retry/timeout/skip-on-failure wrapper around any
//! node operation.
//!
//! Adapted from `executor/retry.rs`'s `RetryConfig`/`retry_with_backoff` —
//! that module implements exponential backoff with jitter for LLM calls.
//! Node retries here use a fixed 3-second backoff between attempts
//! instead, so the config and loop are rebuilt rather than reused as-is;
//! the logging granularity (`info!` on retry, `warn!` on transient
//! failure, `error!` on exhaustion) is kept the same.

use crate::model::NodeExecutionResult;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Default fixed backoff between retry attempts. Documented constant per
/// §4.4; implementations may make it configurable but not smaller by
/// default.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub node_id: String,
    pub retry_count: u32,
    pub timeout_ms: u64,
    pub skip_on_failure: bool,
    pub backoff: Duration,
}

impl StrategyConfig {
    pub fn new(node_id: impl Into<String>, retry_count: u32, timeout_ms: u64, skip_on_failure: bool) -> Self {
        Self {
            node_id: node_id.into(),
            retry_count,
            timeout_ms,
            skip_on_failure,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Runs `op` under the retry/timeout/skip policy described by `config`.
///
/// - Attempts up to `retry_count + 1` times with `config.backoff` between
///   attempts.
/// - If `timeout_ms > 0`, each attempt races a timer; timing out counts as
///   one attempt and produces a `NodeExecutionResult::failure` carrying a
///   timeout message (the strategy never raises `NodeTimeout` itself — it
///   folds the timeout into the same settled-result path as any other
///   failed attempt, so skip-on-failure applies uniformly).
/// - On exhaustion: if `skip_on_failure`, returns the last failed result
///   without raising; otherwise returns the last failed result as-is (the
///   caller — the Workflow Executor — decides whether that is fatal).
pub async fn run_with_strategy<F, Fut>(config: &StrategyConfig, mut op: F) -> NodeExecutionResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = NodeExecutionResult>,
{
    let max_attempts = config.retry_count + 1;
    let mut last_result: Option<NodeExecutionResult> = None;

    for attempt in 0..max_attempts {
        if attempt > 0 {
            info!(
                node_id = %config.node_id,
                attempt,
                max_attempts,
                "retrying node after backoff"
            );
            tokio::time::sleep(config.backoff).await;
        }

        let started_at = now_ms();
        let result = if config.timeout_ms > 0 {
            match tokio::time::timeout(Duration::from_millis(config.timeout_ms), op()).await {
                Ok(result) => result,
                Err(_) => NodeExecutionResult::failure(
                    format!(
                        "node {} timed out after {}ms",
                        config.node_id, config.timeout_ms
                    ),
                    started_at,
                    now_ms(),
                ),
            }
        } else {
            op().await
        };

        if result.success {
            return result;
        }

        warn!(
            node_id = %config.node_id,
            attempt,
            error = result.error.as_deref().unwrap_or("unknown"),
            "node attempt failed"
        );
        last_result = Some(result);
    }

    let final_result = last_result.expect("loop runs at least once since max_attempts >= 1");

    if config.skip_on_failure {
        info!(
            node_id = %config.node_id,
            "skip_on_failure is set; tolerating exhausted retries"
        );
    }

    final_result
}
