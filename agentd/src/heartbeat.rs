//! Per-task heartbeat liveness logger.
//!
//! A periodic tick that logs a liveness line for a running task: status,
//! seconds since the last recorded activity, pid, and byte counters. The
//! ticker mutates nothing; it only reads registry snapshots. It is stopped
//! through the task's cancellation token at finalization; stopping more than
//! once is safe.

use crate::registry::TaskRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Start the heartbeat ticker for a task. Disabled when `interval_secs` is
/// non-positive.
pub fn spawn(
    registry: Arc<TaskRegistry>,
    task_id: String,
    interval_secs: i64,
    token: CancellationToken,
) {
    if interval_secs <= 0 {
        tracing::debug!(task_id = %task_id, "heartbeat disabled by configuration");
        return;
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs as u64));
        // The first tick of a tokio interval fires immediately; skip it so
        // the first heartbeat lands one interval after start.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(task) = registry.get(&task_id).await else {
                        break;
                    };
                    if task.status.is_terminal() {
                        break;
                    }
                    let since_activity = task
                        .last_activity_at
                        .elapsed()
                        .map(|d| d.as_secs())
                        .unwrap_or(0);
                    tracing::info!(
                        task_id = %task_id,
                        status = ?task.status,
                        last_activity_secs = since_activity,
                        pid = ?task.pid,
                        stdout_bytes = task.stdout_bytes,
                        stderr_bytes = task.stderr_bytes,
                        "heartbeat"
                    );
                }
            }
        }
        tracing::debug!(task_id = %task_id, "heartbeat stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskStatus};

    #[tokio::test]
    async fn heartbeat_stops_after_finalization() {
        let registry = Arc::new(TaskRegistry::new());
        let task = Task::new(
            registry.allocate_id(),
            "hi".to_string(),
            "agent".to_string(),
            Some(1),
        );
        let id = task.id.clone();
        let token = task.heartbeat_token.clone();
        registry.insert(task).await;

        spawn(registry.clone(), id.clone(), 1, token.clone());
        registry.finalize(&id, TaskStatus::Completed, Some(0)).await;
        assert!(token.is_cancelled());

        // Cancelling again must be a no-op.
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn non_positive_interval_never_starts_a_ticker() {
        let registry = Arc::new(TaskRegistry::new());
        let token = CancellationToken::new();
        spawn(registry, "absent".to_string(), 0, token.clone());
        // Nothing to observe beyond "does not panic"; the token stays live.
        assert!(!token.is_cancelled());
    }
}
