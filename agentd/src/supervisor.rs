//! Agent process supervision.
//!
//! The supervisor owns the lifecycle of one subprocess per task: it builds
//! the argument vector, fails fast when the configuration file is missing,
//! spawns the process, pumps its stdout/stderr chunks into the registry, and
//! finalizes the task when the process exits. Submission never returns an
//! error: every failure mode resolves into a task with `status=failed`,
//! `exit_code=-1`, and a human-readable log line.
//!
//! There is intentionally no kill or cancellation path: once spawned, a task
//! runs to subprocess exit.

use crate::args;
use crate::config::Config;
use crate::error::TaskError;
use crate::heartbeat;
use crate::monitor;
use crate::registry::TaskRegistry;
use crate::task::{MonitorRequest, MonitorState, Task, TaskStatus};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

/// Directories appended to `PATH` so the agent binary is found even when the
/// server runs under a minimal environment.
const EXTRA_PATH: &str = "/opt/homebrew/bin:/usr/local/bin:/usr/bin";

/// Read buffer size for subprocess stream pumps.
const CHUNK_BUF_BYTES: usize = 8192;

/// Characters of a stdout chunk echoed into the server log.
const PREVIEW_CHARS: usize = 200;

/// One task submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitRequest {
    pub prompt: String,
    /// Per-request agent config file, overriding the process-wide default.
    pub config_path: Option<PathBuf>,
    /// Working directory for the subprocess.
    pub cwd: Option<PathBuf>,
    /// Extra `--flag value` pairs; overrides always win over defaults.
    pub extra_args: Option<Map<String, Value>>,
    /// Optional poll monitor to attach at start.
    pub monitor: Option<MonitorRequest>,
}

/// Spawns and supervises agent subprocesses, one per task.
#[derive(Debug, Clone)]
pub struct Supervisor {
    registry: Arc<TaskRegistry>,
    config: Arc<Config>,
    http: reqwest::Client,
}

impl Supervisor {
    pub fn new(registry: Arc<TaskRegistry>, config: Arc<Config>) -> Self {
        Self {
            registry,
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start one task. Always returns a task snapshot; failures surface as a
    /// task already finalized `failed` with `exit_code = -1`.
    pub async fn start(&self, request: SubmitRequest) -> Task {
        let id = self.registry.allocate_id();

        let built = match args::build(&self.config, &request) {
            Ok(built) => built,
            Err(e) => {
                return self
                    .fail_before_spawn(
                        &id,
                        &request,
                        self.config.agent_command.clone(),
                        format!("ERROR: {e}"),
                    )
                    .await;
            }
        };
        let command_line = built.display(&self.config.agent_command);

        // Fail fast when the config file is absent: no wasted fork.
        let config_exists = tokio::fs::try_exists(&built.config_path)
            .await
            .unwrap_or(false);
        if !config_exists {
            let e = TaskError::ConfigurationFileNotFound(built.config_path);
            return self
                .fail_before_spawn(&id, &request, command_line, format!("ERROR: {e}"))
                .await;
        }

        tracing::info!(task_id = %id, "starting: {command_line}");

        let mut command = Command::new(&self.config.agent_command);
        command
            .args(&built.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let path = std::env::var("PATH").unwrap_or_default();
        command.env("PATH", format!("{path}:{EXTRA_PATH}"));
        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let e = TaskError::Spawn(e);
                return self
                    .fail_before_spawn(&id, &request, command_line, format!("ERROR: {e}"))
                    .await;
            }
        };

        let pid = child.id();
        tracing::info!(task_id = %id, pid = ?pid, "agent process spawned");

        let mut task = Task::new(id.clone(), request.prompt.clone(), command_line, pid);
        if let Some(monitor_request) = &request.monitor {
            task.monitor = Some(MonitorState::new(monitor_request));
        }
        let snapshot = task.clone();
        let heartbeat_token = task.heartbeat_token.clone();
        self.registry.insert(task).await;

        heartbeat::spawn(
            self.registry.clone(),
            id.clone(),
            self.config.heartbeat_secs,
            heartbeat_token,
        );
        if let Some(monitor_request) = request.monitor {
            monitor::spawn(
                self.registry.clone(),
                self.http.clone(),
                id.clone(),
                monitor_request,
            );
        }

        let registry = self.registry.clone();
        tokio::spawn(async move {
            supervise(registry, id, child).await;
        });

        snapshot
    }

    /// Record a submission that failed before any process was forked. The
    /// task is constructed already terminal: `pid = None`, `exit_code = -1`.
    /// A requested monitor is still spawned; its first tick observes the
    /// terminal state and delivers the one `final=true` snapshot.
    async fn fail_before_spawn(
        &self,
        id: &str,
        request: &SubmitRequest,
        command: String,
        message: String,
    ) -> Task {
        tracing::error!(task_id = %id, "{message}");

        let mut task = Task::new(id.to_string(), request.prompt.clone(), command, None);
        task.status = TaskStatus::Failed;
        task.exit_code = Some(-1);
        let now = SystemTime::now();
        task.ended_at = Some(now);
        task.updated_at = now;
        task.duration_ms = Some(0);
        task.logs.push(message);
        if let Some(monitor_request) = &request.monitor {
            task.monitor = Some(MonitorState::new(monitor_request));
        }

        self.registry.insert(task.clone()).await;
        if let Some(monitor_request) = &request.monitor {
            monitor::spawn(
                self.registry.clone(),
                self.http.clone(),
                id.to_string(),
                monitor_request.clone(),
            );
        }
        task
    }
}

/// Own a child process to completion: drain both streams, then finalize the
/// task from its exit status.
async fn supervise(registry: Arc<TaskRegistry>, task_id: String, mut child: Child) {
    let mut pumps = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        pumps.push(tokio::spawn(pump(
            registry.clone(),
            task_id.clone(),
            stdout,
            false,
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(tokio::spawn(pump(
            registry.clone(),
            task_id.clone(),
            stderr,
            true,
        )));
    }

    let exit = child.wait().await;
    // Drain whatever is still buffered in the pipes before finalizing, so
    // the trailing-JSON parse sees the complete stdout.
    for pump in pumps {
        let _ = pump.await;
    }

    match exit {
        Ok(status) => {
            let code = status.code().unwrap_or(-1);
            let final_status = if status.success() {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            };
            tracing::info!(task_id = %task_id, exit_code = code, "agent process exited");
            registry.finalize(&task_id, final_status, Some(code)).await;
        }
        Err(e) => {
            tracing::error!(task_id = %task_id, "process error: {e}");
            registry
                .annotate(&task_id, format!("ERROR: process error: {e}"))
                .await;
            registry.finalize(&task_id, TaskStatus::Failed, Some(-1)).await;
        }
    }
}

/// Forward one subprocess stream into the registry, chunk by chunk, in
/// arrival order.
async fn pump(
    registry: Arc<TaskRegistry>,
    task_id: String,
    mut stream: impl tokio::io::AsyncRead + Unpin,
    is_stderr: bool,
) {
    let label = if is_stderr { "stderr" } else { "stdout" };
    let mut buf = vec![0u8; CHUNK_BUF_BYTES];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]).to_string();
                if is_stderr {
                    tracing::debug!(task_id = %task_id, bytes = n, "{label}: {text}");
                } else {
                    tracing::debug!(
                        task_id = %task_id,
                        bytes = n,
                        "{label}: {}",
                        preview(&text)
                    );
                }
                registry.append_chunk(&task_id, &text, is_stderr).await;
            }
            Err(e) => {
                tracing::warn!(task_id = %task_id, "error reading {label}: {e}");
                break;
            }
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{head}...")
}
