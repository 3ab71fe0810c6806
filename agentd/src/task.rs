//! Task data model
//!
//! A [`Task`] is one supervised invocation of the external agent CLI plus all
//! of the output and metadata accumulated over its lifetime. Tasks are created
//! by the supervisor, mutated through the registry, and never removed; the
//! registry is process-lifetime state.

use crate::time;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

/// Current lifecycle state of a task.
///
/// Transitions are one-directional: `Running` may move to `Completed` or
/// `Failed`, and both of those are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Check if this state is terminal (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Poll-monitor attachment requested by the caller at submission time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorRequest {
    /// Seconds between polls. Values below 1 are clamped up to 1.
    #[serde(default = "default_monitor_interval")]
    pub interval_seconds: u64,
    /// Webhook to POST `{final, task}` snapshots to. Optional; a monitor
    /// without a callback URL still ticks and refreshes `updated_at`.
    pub callback_url: Option<String>,
}

fn default_monitor_interval() -> u64 {
    10
}

/// Live state of a task's poll monitor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorState {
    pub interval_secs: u64,
    pub callback_url: Option<String>,
    #[serde(with = "time")]
    pub started_at: SystemTime,
    #[serde(with = "time")]
    pub next_check_at: SystemTime,
    pub checks: u64,
}

impl MonitorState {
    pub fn new(request: &MonitorRequest) -> Self {
        let interval_secs = request.interval_seconds.max(1);
        let now = SystemTime::now();
        Self {
            interval_secs,
            callback_url: request.callback_url.clone(),
            started_at: now,
            next_check_at: now + Duration::from_secs(interval_secs),
            checks: 0,
        }
    }
}

/// One supervised agent invocation and everything observed about it.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    /// Monotonically assigned decimal id, never reused.
    pub id: String,
    pub status: TaskStatus,
    pub prompt: String,
    /// Human-readable rendering of the spawned command line.
    pub command: String,
    /// OS process id. `None` when no process was ever forked.
    pub pid: Option<u32>,
    #[serde(with = "time")]
    pub created_at: SystemTime,
    /// Refreshed on every observed activity.
    #[serde(with = "time")]
    pub updated_at: SystemTime,
    /// Set exactly once, at finalization.
    #[serde(with = "time::option")]
    pub ended_at: Option<SystemTime>,
    #[serde(with = "time")]
    pub last_activity_at: SystemTime,
    /// `None` while running. `-1` is reserved for supervisor-detected
    /// failures that never produced a real exit code.
    pub exit_code: Option<i32>,
    pub duration_ms: Option<u64>,
    /// Raw stdout/stderr chunks in arrival order, plus synthetic annotations.
    pub logs: Vec<String>,
    /// Insertion-ordered, deduplicated URLs discovered in output.
    pub urls: Vec<String>,
    /// Insertion-ordered, deduplicated file paths discovered in output.
    pub files: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    pub stdout_bytes: u64,
    pub stderr_bytes: u64,
    /// Parsed structured result, present only if the stdout tail was valid JSON.
    pub result_meta: Option<serde_json::Value>,
    pub result_text: Option<String>,
    pub num_turns: Option<u64>,
    pub monitor: Option<MonitorState>,
    /// Stops the heartbeat ticker at finalization. Cancelling is idempotent.
    #[serde(skip)]
    pub heartbeat_token: CancellationToken,
}

impl Task {
    /// Create a new running task. Terminal fields start unset.
    pub fn new(id: String, prompt: String, command: String, pid: Option<u32>) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            status: TaskStatus::Running,
            prompt,
            command,
            pid,
            created_at: now,
            updated_at: now,
            ended_at: None,
            last_activity_at: now,
            exit_code: None,
            duration_ms: None,
            logs: Vec::new(),
            urls: Vec::new(),
            files: Vec::new(),
            stdout: String::new(),
            stderr: String::new(),
            stdout_bytes: 0,
            stderr_bytes: 0,
            result_meta: None,
            result_text: None,
            num_turns: None,
            monitor: None,
            heartbeat_token: CancellationToken::new(),
        }
    }
}
