//! Core library for the agent task control plane.
//!
//! Launches external AI-agent CLI processes, supervises their lifecycle,
//! parses their streamed output for URLs, file paths, and trailing JSON
//! results, and keeps the resulting task state in an in-memory registry.
//! The HTTP surface lives in the companion `agentd_http` crate.

pub mod args;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod monitor;
pub mod output;
pub mod registry;
pub mod server_log;
pub mod supervisor;
pub mod task;
pub mod time;
pub mod view;

pub use config::Config;
pub use error::{Result, TaskError};
pub use registry::TaskRegistry;
pub use supervisor::{SubmitRequest, Supervisor};
pub use task::{MonitorRequest, Task, TaskStatus};
