//! Public task projection.
//!
//! Produces the redacted/truncated representation of a [`Task`] returned
//! over the API and in webhook payloads. Large text fields are included only
//! on request and are tail-truncated: for an in-progress task the most
//! recent output is the relevant part.

use crate::task::{MonitorState, Task, TaskStatus};
use crate::time;
use serde::Serialize;
use serde_json::Value;
use std::time::SystemTime;

/// Maximum characters retained for logs, stdout, and stderr in a view.
pub const MAX_TEXT_CHARS: usize = 20_000;

/// Externally visible task representation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTaskView {
    pub id: String,
    pub status: TaskStatus,
    pub prompt: String,
    pub command: String,
    pub pid: Option<u32>,
    #[serde(with = "time")]
    pub created_at: SystemTime,
    #[serde(with = "time")]
    pub updated_at: SystemTime,
    #[serde(with = "time::option")]
    pub ended_at: Option<SystemTime>,
    #[serde(with = "time")]
    pub last_activity_at: SystemTime,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<u64>,
    pub urls: Vec<String>,
    pub files: Vec<String>,
    pub num_turns: Option<u64>,
    pub result_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_meta: Option<Value>,
    pub monitor: Option<MonitorState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    pub stdout_bytes: u64,
    pub stderr_bytes: u64,
}

/// Project a task for API consumers. `include_logs` gates the large text
/// fields (joined logs, raw stdout/stderr, result metadata), each truncated
/// to the last [`MAX_TEXT_CHARS`] characters.
pub fn public_view(task: &Task, include_logs: bool) -> PublicTaskView {
    let (logs, stdout, stderr, result_meta) = if include_logs {
        let joined = task.logs.concat();
        (
            Some(tail(&joined, MAX_TEXT_CHARS).to_string()),
            Some(tail(&task.stdout, MAX_TEXT_CHARS).to_string()),
            Some(tail(&task.stderr, MAX_TEXT_CHARS).to_string()),
            task.result_meta.clone(),
        )
    } else {
        (None, None, None, None)
    };

    PublicTaskView {
        id: task.id.clone(),
        status: task.status,
        prompt: task.prompt.clone(),
        command: task.command.clone(),
        pid: task.pid,
        created_at: task.created_at,
        updated_at: task.updated_at,
        ended_at: task.ended_at,
        last_activity_at: task.last_activity_at,
        exit_code: task.exit_code,
        duration_ms: task.duration_ms,
        urls: task.urls.clone(),
        files: task.files.clone(),
        num_turns: task.num_turns,
        result_text: task.result_text.clone(),
        result_meta,
        monitor: task.monitor.clone(),
        logs,
        stdout,
        stderr,
        stdout_bytes: task.stdout_bytes,
        stderr_bytes: task.stderr_bytes,
    }
}

/// Keep at most the last `max_chars` characters of `text` (tail-keep).
/// Splits on a character boundary so multi-byte content stays valid.
pub fn tail(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let skip = total - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}
