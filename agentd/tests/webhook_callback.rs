//! Poll monitor webhook delivery tests.
//!
//! Runs a local HTTP sink, submits a monitored task against a mock agent
//! script, and asserts on the sequence of `{final, task}` payloads the
//! monitor POSTs to the callback URL.

use agentd::{Config, MonitorRequest, SubmitRequest, Supervisor, TaskRegistry, TaskStatus};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

type Received = Arc<Mutex<Vec<Value>>>;

async fn record(State(received): State<Received>, Json(body): Json<Value>) {
    received.lock().unwrap().push(body);
}

/// Bind a callback sink on an ephemeral port. Returns the hook URL and the
/// shared list of received payloads.
async fn spawn_sink() -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/hook", post(record))
        .with_state(received.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/hook"), received)
}

fn write_script(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("agent.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn supervisor_for(dir: &TempDir, script_body: &str) -> Supervisor {
    let script = write_script(dir, script_body);
    let config_path = dir.path().join("mcp.json");
    std::fs::write(&config_path, "{}").unwrap();
    let config = Config {
        agent_command: script.display().to_string(),
        agent_config_path: Some(config_path),
        heartbeat_secs: 0,
        ..Config::default()
    };
    Supervisor::new(Arc::new(TaskRegistry::new()), Arc::new(config))
}

async fn wait_for_final(received: &Received) -> Value {
    tokio::time::timeout(Duration::from_secs(15), async {
        loop {
            {
                let payloads = received.lock().unwrap();
                if let Some(final_payload) =
                    payloads.iter().find(|p| p["final"] == Value::Bool(true))
                {
                    return final_payload.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("no final webhook arrived in time")
}

#[tokio::test]
async fn monitor_posts_exactly_one_final_snapshot() {
    let dir = TempDir::new().unwrap();
    let supervisor = supervisor_for(
        &dir,
        r#"sleep 1.3
printf '{"result":"ok","num_turns":1}'"#,
    );
    let (hook_url, received) = spawn_sink().await;

    let request = SubmitRequest {
        prompt: "long job".to_string(),
        monitor: Some(MonitorRequest {
            interval_seconds: 1,
            callback_url: Some(hook_url),
        }),
        ..SubmitRequest::default()
    };
    let task = supervisor.start(request).await;
    assert!(task.monitor.is_some());

    let final_payload = wait_for_final(&received).await;
    assert_eq!(final_payload["task"]["id"], task.id);
    assert_eq!(final_payload["task"]["status"], "completed");
    assert_eq!(final_payload["task"]["resultText"], "ok");
    // The final snapshot carries the large text fields.
    assert!(final_payload["task"]["stdout"].is_string());

    // The monitor self-cancels after the final post: nothing arrives later.
    let count_at_final = received.lock().unwrap().len();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let payloads = received.lock().unwrap();
    assert_eq!(payloads.len(), count_at_final);
    let finals = payloads
        .iter()
        .filter(|p| p["final"] == Value::Bool(true))
        .count();
    assert_eq!(finals, 1);
}

#[tokio::test]
async fn interim_snapshots_are_marked_non_final_and_omit_logs() {
    let dir = TempDir::new().unwrap();
    let supervisor = supervisor_for(
        &dir,
        r#"echo "working"
sleep 2.5
echo "done""#,
    );
    let (hook_url, received) = spawn_sink().await;

    let request = SubmitRequest {
        prompt: "slow job".to_string(),
        monitor: Some(MonitorRequest {
            interval_seconds: 1,
            callback_url: Some(hook_url),
        }),
        ..SubmitRequest::default()
    };
    let task = supervisor.start(request).await;

    let final_payload = wait_for_final(&received).await;
    assert_eq!(final_payload["task"]["id"], task.id);

    let payloads = received.lock().unwrap();
    let interim: Vec<&Value> = payloads
        .iter()
        .filter(|p| p["final"] == Value::Bool(false))
        .collect();
    assert!(!interim.is_empty(), "expected at least one interim tick");
    for payload in interim {
        assert_eq!(payload["task"]["status"], "running");
        // Interim snapshots omit the large text fields entirely.
        assert!(payload["task"].get("stdout").is_none());
        assert!(payload["task"].get("logs").is_none());
    }

    // Check counters advance monotonically across the sequence.
    let checks: Vec<u64> = payloads
        .iter()
        .map(|p| p["task"]["monitor"]["checks"].as_u64().unwrap())
        .collect();
    for pair in checks.windows(2) {
        assert!(pair[1] > pair[0]);
    }
}

#[tokio::test]
async fn fail_fast_submission_still_posts_a_final_snapshot() {
    // No config path anywhere: the task is terminal before any spawn, but a
    // requested monitor must still deliver its one final=true snapshot.
    let config = Config {
        agent_config_path: None,
        heartbeat_secs: 0,
        ..Config::default()
    };
    let supervisor = Supervisor::new(Arc::new(TaskRegistry::new()), Arc::new(config));
    let (hook_url, received) = spawn_sink().await;

    let request = SubmitRequest {
        prompt: "misconfigured".to_string(),
        monitor: Some(MonitorRequest {
            interval_seconds: 1,
            callback_url: Some(hook_url),
        }),
        ..SubmitRequest::default()
    };
    let task = supervisor.start(request).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.monitor.is_some());

    let final_payload = wait_for_final(&received).await;
    assert_eq!(final_payload["task"]["id"], task.id);
    assert_eq!(final_payload["task"]["status"], "failed");
    assert_eq!(final_payload["task"]["exitCode"], -1);

    // Exactly one final post, and nothing after it.
    let count_at_final = received.lock().unwrap().len();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let payloads = received.lock().unwrap();
    assert_eq!(payloads.len(), count_at_final);
    let finals = payloads
        .iter()
        .filter(|p| p["final"] == Value::Bool(true))
        .count();
    assert_eq!(finals, 1);
}

#[tokio::test]
async fn unreachable_callback_does_not_disturb_the_task() {
    let dir = TempDir::new().unwrap();
    let supervisor = supervisor_for(&dir, r#"echo "fine""#);

    let request = SubmitRequest {
        prompt: "job".to_string(),
        monitor: Some(MonitorRequest {
            interval_seconds: 1,
            // Nothing listens here; every delivery fails.
            callback_url: Some("http://127.0.0.1:9/hook".to_string()),
        }),
        ..SubmitRequest::default()
    };
    let task = supervisor.start(request).await;

    let done = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(task) = supervisor.registry().get(&task.id).await
                && task.status.is_terminal()
            {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(done.status, agentd::TaskStatus::Completed);
    // The monitor kept ticking despite failed deliveries.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let after = supervisor.registry().get(&task.id).await.unwrap();
    assert!(after.monitor.unwrap().checks >= 1);
}
