//! HTTP surface of the agent task control plane.
//!
//! A small polling API over the core `agentd` crate: submit a task, poll its
//! status or final result, inspect server health and the recent server log.
//! All responses are JSON. State is process-local; there is no persistence
//! across restarts.

pub mod error;

pub use error::{Result, ServeError};

use agentd::registry::TaskCounts;
use agentd::server_log::LogBuffer;
use agentd::view::{self, PublicTaskView};
use agentd::{Config, SubmitRequest, Supervisor, TaskRegistry};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Bounds on the `limit` query of the log endpoint.
const LOG_LIMIT_DEFAULT: usize = 200;
const LOG_LIMIT_MAX: usize = 1000;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    supervisor: Supervisor,
    log_buffer: Arc<LogBuffer>,
    started_at: SystemTime,
}

impl AppState {
    pub fn new(config: Config, log_buffer: Arc<LogBuffer>) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        Self {
            supervisor: Supervisor::new(registry, Arc::new(config)),
            log_buffer,
            started_at: SystemTime::now(),
        }
    }

    fn registry(&self) -> &Arc<TaskRegistry> {
        self.supervisor.registry()
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/submit", post(handle_submit))
        .route("/status", get(handle_status))
        .route("/result", get(handle_result))
        .route("/health", get(handle_health))
        .route("/logs", get(handle_logs))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn start_server(bind_addr: SocketAddr, state: AppState) -> Result<()> {
    if !bind_addr.ip().is_loopback() {
        warn!(
            "server bound to non-loopback address {bind_addr} with no authentication. \
             Restrict access via firewall or reverse proxy."
        );
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| ServeError::HttpServer(format!("failed to get local addr: {e}")))?;
    info!("listening on http://{local_addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| ServeError::HttpServer(format!("server error: {e}")))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct TaskQuery {
    id: Option<String>,
    /// Truthy (`1` or `true`) to include the large text fields.
    logs: Option<String>,
}

fn wants_logs(query: &TaskQuery) -> bool {
    matches!(query.logs.as_deref(), Some("1") | Some("true"))
}

#[derive(Serialize)]
struct TaskEnvelope {
    task: PublicTaskView,
}

#[derive(Serialize)]
struct TaskListEnvelope {
    tasks: Vec<PublicTaskView>,
    stats: TaskCounts,
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": format!("no task with id {id}")})),
    )
        .into_response()
}

/// `POST /submit`: start a task. Always `202 Accepted`; a submission that
/// failed before spawn comes back as an already-failed task.
async fn handle_submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Response {
    let task = state.supervisor.start(request).await;
    (
        StatusCode::ACCEPTED,
        Json(TaskEnvelope {
            task: view::public_view(&task, false),
        }),
    )
        .into_response()
}

/// `GET /status?id=&logs=`: one task, or all tasks plus aggregate counts
/// when no id is given.
async fn handle_status(State(state): State<AppState>, Query(query): Query<TaskQuery>) -> Response {
    let include_logs = wants_logs(&query);
    match &query.id {
        Some(id) => match state.registry().get(id).await {
            Some(task) => Json(TaskEnvelope {
                task: view::public_view(&task, include_logs),
            })
            .into_response(),
            None => not_found(id),
        },
        None => {
            let tasks = state
                .registry()
                .list()
                .await
                .iter()
                .map(|t| view::public_view(t, include_logs))
                .collect();
            let stats = state.registry().counts().await;
            Json(TaskListEnvelope { tasks, stats }).into_response()
        }
    }
}

/// `GET /result?id=&logs=`: like single-task status, but the id is
/// mandatory. Callers poll this until `status` leaves `running`.
async fn handle_result(State(state): State<AppState>, Query(query): Query<TaskQuery>) -> Response {
    let Some(id) = &query.id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "id query parameter is required"})),
        )
            .into_response();
    };
    match state.registry().get(id).await {
        Some(task) => Json(TaskEnvelope {
            task: view::public_view(&task, wants_logs(&query)),
        })
        .into_response(),
        None => not_found(id),
    }
}

/// `GET /health`: liveness plus aggregate task counts.
async fn handle_health(State(state): State<AppState>) -> Response {
    let uptime_seconds = state
        .started_at
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Json(serde_json::json!({
        "status": "ok",
        "pid": std::process::id(),
        "startedAt": agentd::time::to_rfc3339(state.started_at),
        "uptimeSeconds": uptime_seconds,
        "tasks": state.registry().counts().await,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    limit: Option<usize>,
    /// Sequence marker; only lines after it are returned.
    since: Option<u64>,
}

/// `GET /logs?limit=&since=`: recent server log lines.
async fn handle_logs(State(state): State<AppState>, Query(query): Query<LogQuery>) -> Response {
    let limit = query.limit.unwrap_or(LOG_LIMIT_DEFAULT).clamp(1, LOG_LIMIT_MAX);
    let lines = match query.since {
        Some(marker) => state.log_buffer.since(marker, limit),
        None => state.log_buffer.tail(limit),
    };
    let rendered: Vec<&str> = lines.iter().map(|l| l.line.as_str()).collect();
    Json(serde_json::json!({
        "lines": rendered,
        "count": rendered.len(),
        "lastSeq": lines.last().map(|l| l.seq).unwrap_or_else(|| state.log_buffer.last_seq()),
    }))
    .into_response()
}
