//! Error types for task submission and supervision.
//!
//! Every variant here resolves locally into a task's terminal fields: the
//! supervisor converts them into a `failed` task with `exit_code = -1` and a
//! human-readable log line. None of them crash the server process.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error(
        "agent configuration path is required; pass configPath or configure a process-wide default"
    )]
    ConfigurationMissing,

    #[error("agent configuration file not found at {}", .0.display())]
    ConfigurationFileNotFound(PathBuf),

    #[error("failed to spawn agent process: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TaskError>;
