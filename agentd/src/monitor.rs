//! Poll monitor and webhook callback notifier.
//!
//! An optional per-task ticker attached at submission time. Each tick bumps
//! the task's check counter through the registry and, when a callback URL is
//! configured, POSTs a `{final, task}` snapshot to it. The tick that first
//! observes a terminal status sends `final=true` exactly once and then the
//! monitor self-cancels, and no tick fires after that. Delivery is best-effort:
//! failures are logged at debug level and swallowed, with no retry.

use crate::registry::TaskRegistry;
use crate::task::{MonitorRequest, Task};
use crate::view;
use std::sync::Arc;
use std::time::Duration;

/// Start the poll monitor for a task.
pub fn spawn(
    registry: Arc<TaskRegistry>,
    http: reqwest::Client,
    task_id: String,
    request: MonitorRequest,
) {
    let interval = Duration::from_secs(request.interval_seconds.max(1));
    let callback_url = request.callback_url;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick; the first check happens one
        // interval after attachment.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some((task, is_final)) = registry.tick_monitor(&task_id).await else {
                tracing::debug!(task_id = %task_id, "poll monitor detached");
                break;
            };

            if let Some(url) = callback_url.as_deref() {
                post_snapshot(&http, url, &task, is_final).await;
            }

            if is_final {
                tracing::debug!(task_id = %task_id, "poll monitor finished");
                break;
            }
        }
    });
}

/// Best-effort webhook delivery. Errors are swallowed by design.
async fn post_snapshot(http: &reqwest::Client, url: &str, task: &Task, is_final: bool) {
    let payload = serde_json::json!({
        "final": is_final,
        "task": view::public_view(task, is_final),
    });

    match http.post(url).json(&payload).send().await {
        Ok(response) => {
            tracing::debug!(
                task_id = %task.id,
                status = %response.status(),
                is_final,
                "webhook delivered"
            );
        }
        Err(e) => {
            tracing::debug!(task_id = %task.id, "webhook delivery failed: {e}");
        }
    }
}
