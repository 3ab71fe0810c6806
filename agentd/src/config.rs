//! Process-wide configuration for the agent control plane.
//!
//! All values are read once at startup and treated as immutable for the
//! lifetime of the server. Per-request overrides (config path, extra flags)
//! live on the submission request, not here.

use std::path::PathBuf;

/// Defaults applied to every spawned agent invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Executable name or path of the agent CLI.
    pub agent_command: String,
    /// Default path to the agent's own configuration file. A submission must
    /// resolve a config path from its own override or this default, or it
    /// fails before any process is spawned.
    pub agent_config_path: Option<PathBuf>,
    /// Pass `--dangerously-skip-permissions` to the agent.
    pub skip_permissions: bool,
    /// Agent debug verbosity. `Some("1")` / `Some("true")` emit a bare
    /// `--debug`; any other value is passed as `--debug <value>`.
    pub debug: Option<String>,
    /// Default `--output-format`, appended unless the caller overrides it.
    /// An empty string disables the auto-append.
    pub output_format: String,
    /// Default `--max-turns`, appended unless the caller overrides it.
    pub max_turns: Option<u32>,
    /// Heartbeat interval in seconds. Non-positive disables the heartbeat.
    pub heartbeat_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent_command: "claude".to_string(),
            agent_config_path: None,
            skip_permissions: false,
            debug: None,
            output_format: "json".to_string(),
            max_turns: None,
            heartbeat_secs: 10,
        }
    }
}
