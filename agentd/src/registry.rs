//! In-memory task registry.
//!
//! Owned store of all [`Task`] records, keyed by monotonically increasing
//! ids. The registry is the sole mutator of task status and exit fields;
//! output chunks and monitor ticks flow through its methods so every field
//! has a single writer. There is no teardown; tasks live for the process
//! lifetime.

use crate::output;
use crate::task::{Task, TaskStatus};
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime},
};
use tokio::sync::RwLock;

/// Per-status task totals for `/status` and `/health`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TaskCounts {
    pub total: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Task>>,
    next_id: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate the next task id. Ids are unique and strictly increasing in
    /// allocation order, and never reused.
    pub fn allocate_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    pub async fn insert(&self, task: Task) {
        let mut tasks = self.tasks.write().await;
        tracing::debug!(task_id = %task.id, "task registered");
        tasks.insert(task.id.clone(), task);
    }

    /// Snapshot of one task.
    pub async fn get(&self, id: &str) -> Option<Task> {
        let tasks = self.tasks.read().await;
        tasks.get(id).cloned()
    }

    /// Snapshots of all tasks, ordered by id.
    pub async fn list(&self) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut all: Vec<Task> = tasks.values().cloned().collect();
        all.sort_by_key(|t| t.id.parse::<u64>().unwrap_or(u64::MAX));
        all
    }

    pub async fn counts(&self) -> TaskCounts {
        let tasks = self.tasks.read().await;
        let mut counts = TaskCounts::default();
        for task in tasks.values() {
            counts.total += 1;
            match task.status {
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Append one raw output chunk: record it in the log sequence, accumulate
    /// the stream buffer and byte counter, refresh activity timestamps, and
    /// run URL/path extraction against the already-seen sets.
    pub async fn append_chunk(&self, id: &str, text: &str, is_stderr: bool) {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(id) else {
            return;
        };

        task.logs.push(text.to_string());
        let now = SystemTime::now();
        task.updated_at = now;
        task.last_activity_at = now;

        if is_stderr {
            task.stderr.push_str(text);
            task.stderr_bytes += text.len() as u64;
        } else {
            task.stdout.push_str(text);
            task.stdout_bytes += text.len() as u64;
        }

        for url in output::extract_urls(text, &task.urls) {
            task.urls.push(url);
        }
        for path in output::extract_paths(text, &task.files) {
            task.files.push(path);
        }
    }

    /// Append a synthetic annotation line to a task's log sequence.
    pub async fn annotate(&self, id: &str, line: String) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(id) {
            task.logs.push(line);
            task.updated_at = SystemTime::now();
        }
    }

    /// Finalize a task: set its terminal status and exit code, stamp
    /// `ended_at` exactly once, compute the duration, stop the heartbeat, and
    /// attempt the trailing-JSON result parse.
    ///
    /// Terminal states are absorbing: finalizing an already-terminal task is
    /// a no-op that returns the existing snapshot.
    pub async fn finalize(
        &self,
        id: &str,
        status: TaskStatus,
        exit_code: Option<i32>,
    ) -> Option<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(id)?;

        if task.status.is_terminal() {
            tracing::debug!(task_id = %id, "finalize on terminal task ignored");
            return Some(task.clone());
        }

        task.status = status;
        task.exit_code = exit_code;
        let now = SystemTime::now();
        task.ended_at = Some(now);
        task.updated_at = now;
        task.duration_ms = now
            .duration_since(task.created_at)
            .ok()
            .map(|d| d.as_millis() as u64);
        task.heartbeat_token.cancel();

        if let Some(summary) = output::parse_result(&task.stdout) {
            task.num_turns = summary.num_turns;
            if let Some(text) = &summary.result_text {
                task.result_text = Some(text.clone());
                task.logs.push(format!("\n[AI Result]\n{text}\n"));
            }
            task.result_meta = Some(summary.meta);
        }

        tracing::info!(
            task_id = %id,
            status = ?task.status,
            exit_code = ?task.exit_code,
            duration_ms = ?task.duration_ms,
            "task finalized"
        );
        Some(task.clone())
    }

    /// One poll-monitor tick: bump the check counter, schedule the next
    /// check, refresh `updated_at`, and report whether the task has reached a
    /// terminal state. Returns `None` when the task has no monitor attached.
    pub async fn tick_monitor(&self, id: &str) -> Option<(Task, bool)> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(id)?;
        let monitor = task.monitor.as_mut()?;

        monitor.checks += 1;
        let now = SystemTime::now();
        monitor.next_check_at = now + Duration::from_secs(monitor.interval_secs);
        task.updated_at = now;

        let is_final = task.status.is_terminal();
        Some((task.clone(), is_final))
    }
}
