use agentd::server_log::{BufferLayer, LogBuffer};
use agentd_http::AppState;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Local control plane for external AI-agent CLI processes.
///
/// Accepts task submissions over HTTP, spawns one agent subprocess per task,
/// and exposes task state for polling plus optional webhook callbacks.
#[derive(Parser, Debug)]
#[command(name = "agentd_http")]
#[command(version, about)]
struct Args {
    /// Address to bind the HTTP server.
    #[arg(long, default_value = "127.0.0.1:7777")]
    bind_addr: SocketAddr,

    /// Executable name or path of the agent CLI.
    #[arg(long, default_value = "claude")]
    agent_command: String,

    /// Default agent configuration file. Falls back to the
    /// AGENT_CONFIG_PATH environment variable when not given.
    #[arg(long)]
    agent_config: Option<PathBuf>,

    /// Pass --dangerously-skip-permissions to every agent invocation.
    #[arg(long)]
    skip_permissions: bool,

    /// Agent debug verbosity. "1" or "true" emit a bare --debug flag,
    /// anything else is passed as --debug <value>.
    #[arg(long)]
    debug: Option<String>,

    /// Default --output-format for the agent. Empty disables the default.
    #[arg(long, default_value = "json")]
    output_format: String,

    /// Default --max-turns for the agent.
    #[arg(long)]
    max_turns: Option<u32>,

    /// Heartbeat interval in seconds. Zero or negative disables heartbeats.
    #[arg(long, default_value_t = 10)]
    heartbeat_secs: i64,

    /// Also append server log lines to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_buffer = Arc::new(match &args.log_file {
        Some(path) => LogBuffer::with_file(path)?,
        None => LogBuffer::new(),
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(BufferLayer::new(log_buffer.clone()))
        .init();

    let agent_config_path = args
        .agent_config
        .or_else(|| std::env::var_os("AGENT_CONFIG_PATH").map(PathBuf::from));
    if agent_config_path.is_none() {
        tracing::warn!(
            "no default agent config; submissions must carry their own configPath"
        );
    }

    let config = agentd::Config {
        agent_command: args.agent_command,
        agent_config_path,
        skip_permissions: args.skip_permissions,
        debug: args.debug,
        output_format: args.output_format,
        max_turns: args.max_turns,
        heartbeat_secs: args.heartbeat_secs,
    };

    tracing::info!("agent command: {}", config.agent_command);
    tracing::info!("starting server on {}", args.bind_addr);

    let state = AppState::new(config, log_buffer);
    agentd_http::start_server(args.bind_addr, state).await?;
    Ok(())
}
