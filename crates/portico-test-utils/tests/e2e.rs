// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete gateway pipeline.
//!
//! Each test builds an isolated harness: temp data dir, wiremock IdP, a
//! real spawned `mock-worker` default worker, and the gateway on an
//! ephemeral port. Tests are independent and order-insensitive.

use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};

use portico_test_utils::mock_idp::{mount_happy_idp, mount_token_endpoints, user_info_guard};
use portico_test_utils::TestHarness;

const WORKER_BIN: &str = env!("CARGO_BIN_EXE_mock-worker");

/// Reads SSE `data:` events from a streaming response until `count` events
/// arrived or the timeout expires.
async fn read_sse_events(response: reqwest::Response, count: usize) -> Vec<Value> {
    let mut events = Vec::new();
    let mut buffer = String::new();
    let mut stream = response.bytes_stream();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while events.len() < count {
        let chunk = tokio::time::timeout_at(deadline, stream.next())
            .await
            .expect("timed out waiting for SSE events");
        let Some(chunk) = chunk else { break };
        buffer.push_str(&String::from_utf8_lossy(&chunk.expect("stream chunk")));

        while let Some(newline) = buffer.find('\n') {
            let line = buffer[..newline].trim_end().to_string();
            buffer.drain(..=newline);
            if let Some(payload) = line.strip_prefix("data: ") {
                if let Ok(value) = serde_json::from_str::<Value>(payload) {
                    events.push(value);
                }
            }
        }
    }
    events
}

/// Polls an async condition until it holds or the timeout expires.
async fn wait_until<F, Fut>(what: &str, timeout: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn health(harness: &TestHarness) -> Value {
    harness
        .http
        .get(format!("{}/health", harness.base_url))
        .send()
        .await
        .expect("health request")
        .json()
        .await
        .expect("health json")
}

async fn complete_oauth(harness: &TestHarness, session_id: &str) -> reqwest::Response {
    let state = harness.oauth_state_for(session_id).await;
    harness
        .http
        .get(format!(
            "{}/oauth/callback?code=C1&state={state}",
            harness.base_url
        ))
        .send()
        .await
        .expect("callback request")
}

// ---- S1: unauthenticated bootstrap ----

#[tokio::test]
async fn s1_unauthenticated_bootstrap() {
    let harness = TestHarness::builder(WORKER_BIN).build().await;

    let response = harness
        .http
        .get(format!("{}/sse", harness.base_url))
        .send()
        .await
        .expect("sse request");
    assert_eq!(response.status().as_u16(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let events = read_sse_events(response, 2).await;
    assert_eq!(events.len(), 2, "expected metadata + capabilities");

    let metadata = &events[0];
    assert_eq!(metadata["type"], "metadata");
    let session_id = metadata["session_id"].as_str().expect("session id");
    assert!(!session_id.is_empty());
    assert_eq!(metadata["authenticated"], false);
    assert!(metadata["oauth_url"].as_str().is_some());
    assert!(metadata["tools"].is_array());
    assert!(metadata["endpoint"]
        .as_str()
        .unwrap()
        .contains(&format!("sessionId={session_id}")));

    let capabilities = &events[1];
    assert_eq!(capabilities["type"], "capabilities");
    assert!(capabilities["capabilities"].is_object());

    harness.shutdown().await;
}

#[tokio::test]
async fn s1_supplied_session_id_is_kept() {
    let harness = TestHarness::builder(WORKER_BIN).build().await;

    let response = harness
        .http
        .get(format!("{}/sse?sessionId=my-session", harness.base_url))
        .send()
        .await
        .expect("sse request");
    let events = read_sse_events(response, 1).await;
    assert_eq!(events[0]["session_id"], "my-session");

    harness.shutdown().await;
}

// ---- S2: OAuth happy path ----

#[tokio::test]
async fn s2_oauth_happy_path() {
    let harness = TestHarness::builder(WORKER_BIN).build().await;
    mount_happy_idp(&harness.idp_server, "on_user_s2").await;

    let response = complete_oauth(&harness, "sess-s2").await;
    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.expect("callback body");
    assert!(body.to_lowercase().contains("successful"), "got: {body}");

    assert_eq!(
        harness.registry.user_of("sess-s2"),
        Some("on_user_s2".to_string())
    );

    // tokens.json exists with an expiry ~ now + expires_in (7200 s).
    let tokens_path = harness
        .data_path()
        .join("user-on_user_s2")
        .join("tokens.json");
    let raw = std::fs::read_to_string(&tokens_path).expect("tokens.json written");
    let record: Value = serde_json::from_str(&raw).expect("tokens.json parses");
    let expires_at = chrono::DateTime::parse_from_rfc3339(record["expires_at"].as_str().unwrap())
        .expect("expiry parses")
        .with_timezone(&chrono::Utc);
    let remaining = expires_at - chrono::Utc::now();
    assert!(remaining > chrono::Duration::minutes(115));
    assert!(remaining <= chrono::Duration::minutes(121));

    // Refresh token is sealed, not plaintext.
    assert!(!raw.contains("rt-test"));

    harness.shutdown().await;
}

#[tokio::test]
async fn authenticated_sse_omits_oauth_url() {
    let harness = TestHarness::builder(WORKER_BIN).build().await;
    mount_happy_idp(&harness.idp_server, "on_user_sse").await;
    complete_oauth(&harness, "sess-auth").await;

    let response = harness
        .http
        .get(format!("{}/sse?sessionId=sess-auth", harness.base_url))
        .send()
        .await
        .expect("sse request");
    let events = read_sse_events(response, 1).await;
    assert_eq!(events[0]["authenticated"], true);
    assert!(events[0].get("oauth_url").is_none());

    harness.shutdown().await;
}

// ---- S3: replay attack ----

#[tokio::test]
async fn s3_state_replay_is_rejected() {
    let harness = TestHarness::builder(WORKER_BIN).build().await;
    mount_happy_idp(&harness.idp_server, "on_user_s3").await;

    let state = harness.oauth_state_for("sess-s3").await;
    let callback_url = format!("{}/oauth/callback?code=C1&state={state}", harness.base_url);

    let first = harness.http.get(&callback_url).send().await.unwrap();
    assert_eq!(first.status().as_u16(), 200);

    let replay = harness.http.get(&callback_url).send().await.unwrap();
    assert_eq!(replay.status().as_u16(), 400);
    let body = replay.text().await.unwrap();
    assert!(
        body.contains("Invalid or expired state"),
        "got: {body}"
    );

    harness.shutdown().await;
}

// ---- S4: worker lifecycle ----

#[tokio::test]
async fn s4_worker_lifecycle_spawn_route_reap() {
    let harness = TestHarness::builder(WORKER_BIN)
        .with_idle_reaping(1_500, 300)
        .build()
        .await;
    mount_happy_idp(&harness.idp_server, "on_user_s4").await;
    complete_oauth(&harness, "sess-s4").await;
    harness.supervisor.spawn_background_tasks(tokio_util_token());

    let response: Value = harness
        .http
        .post(format!(
            "{}/messages?sessionId=sess-s4",
            harness.base_url
        ))
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .send()
        .await
        .expect("messages request")
        .json()
        .await
        .expect("messages json");
    assert_eq!(response["id"], 1);
    assert!(response["result"]["tools"].is_array());

    // A user worker exists on a port in the allocated range.
    let worker = harness
        .supervisor
        .get_or_create("on_user_s4")
        .await
        .expect("worker exists");
    assert!(worker.port >= harness.base_port);

    let snapshot = health(&harness).await;
    assert_eq!(snapshot["instances"]["userInstances"], 1);

    // The worker was handed the user's token directory.
    let pid_file = harness
        .data_path()
        .join("user-on_user_s4")
        .join("worker.pid");
    assert!(pid_file.exists(), "worker should write into its token dir");

    // Past the idle timeout the reaper stops it.
    wait_until("idle worker reaped", Duration::from_secs(10), || async {
        health(&harness).await["instances"]["userInstances"] == 0
    })
    .await;

    harness.shutdown().await;
}

#[tokio::test]
async fn concurrent_requests_share_one_worker() {
    let harness = TestHarness::builder(WORKER_BIN).build().await;
    mount_happy_idp(&harness.idp_server, "on_user_cc").await;
    complete_oauth(&harness, "sess-cc").await;

    let url = format!("{}/messages?sessionId=sess-cc", harness.base_url);
    let requests = (0..4).map(|i| {
        let http = harness.http.clone();
        let url = url.clone();
        async move {
            http.post(&url)
                .json(&json!({"jsonrpc": "2.0", "id": i, "method": "tools/call", "params": {"i": i}}))
                .send()
                .await
                .expect("request")
                .json::<Value>()
                .await
                .expect("json")
        }
    });
    let responses = futures::future::join_all(requests).await;
    for response in &responses {
        assert!(response["result"].is_object(), "got: {response}");
    }

    let snapshot = health(&harness).await;
    assert_eq!(snapshot["instances"]["userInstances"], 1);

    harness.shutdown().await;
}

// ---- S5: max-instance fallback ----

#[tokio::test]
async fn s5_max_instances_falls_back_to_default() {
    let harness = TestHarness::builder(WORKER_BIN)
        .with_max_instances(2)
        .build()
        .await;
    mount_token_endpoints(&harness.idp_server).await;

    for (session, user) in [
        ("sess-m1", "on_u1"),
        ("sess-m2", "on_u2"),
        ("sess-m3", "on_u3"),
    ] {
        let _guard = user_info_guard(&harness.idp_server, user).await;
        let response = complete_oauth(&harness, session).await;
        assert_eq!(response.status().as_u16(), 200);
    }

    let mut token_dirs = Vec::new();
    for (i, session) in ["sess-m1", "sess-m2", "sess-m3"].iter().enumerate() {
        let response: Value = harness
            .http
            .post(format!(
                "{}/messages?sessionId={session}",
                harness.base_url
            ))
            .json(&json!({"jsonrpc": "2.0", "id": i, "method": "tools/call"}))
            .send()
            .await
            .expect("request")
            .json()
            .await
            .expect("json");
        // Every caller gets an answer, never an exception.
        assert!(response["result"].is_object(), "got: {response}");
        token_dirs.push(response["result"]["token_dir"].as_str().unwrap().to_string());
    }

    // Two user workers; the third request was served by the default worker.
    let snapshot = health(&harness).await;
    assert_eq!(snapshot["instances"]["userInstances"], 2);
    assert!(token_dirs[0].ends_with("user-on_u1"));
    assert!(token_dirs[1].ends_with("user-on_u2"));
    assert!(token_dirs[2].ends_with("default"));

    harness.shutdown().await;
}

// ---- S6: default-worker crash semantics ----

#[tokio::test]
async fn s6_default_worker_crash_keeps_sse_working() {
    let harness = TestHarness::builder(WORKER_BIN).build().await;

    // Kill the default worker's child out from under the supervisor.
    let pid = std::fs::read_to_string(
        harness.data_path().join("default").join("worker.pid"),
    )
    .expect("default worker pid file")
    .trim()
    .to_string();
    let killed = std::process::Command::new("kill")
        .args(["-9", &pid])
        .status()
        .expect("kill runs");
    assert!(killed.success());

    wait_until(
        "default worker leaves running",
        Duration::from_secs(10),
        || async {
            health(&harness).await["instances"]["defaultInstanceStatus"] != "running"
        },
    )
    .await;
    assert_eq!(health(&harness).await["status"], "unhealthy");

    // The event stream still bootstraps from fallbacks.
    let response = harness
        .http
        .get(format!("{}/sse", harness.base_url))
        .send()
        .await
        .expect("sse request");
    let events = read_sse_events(response, 2).await;
    assert_eq!(events[0]["type"], "metadata");
    assert!(events[0]["tools"].is_array());
    assert_eq!(events[1]["type"], "capabilities");

    harness.shutdown().await;
}

// ---- shutdown kills every child ----

#[tokio::test]
async fn shutdown_terminates_all_worker_children() {
    let harness = TestHarness::builder(WORKER_BIN).build().await;
    mount_happy_idp(&harness.idp_server, "on_user_sd").await;
    complete_oauth(&harness, "sess-sd").await;

    // Materialize a user worker.
    harness
        .http
        .post(format!("{}/messages?sessionId=sess-sd", harness.base_url))
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .send()
        .await
        .expect("request");

    let mut pids = Vec::new();
    for dir in ["default", "user-on_user_sd"] {
        let pid = std::fs::read_to_string(
            harness.data_path().join(dir).join("worker.pid"),
        )
        .expect("pid file")
        .trim()
        .to_string();
        pids.push(pid);
    }

    harness.shutdown().await;

    for pid in pids {
        // kill -0 succeeds only while the process is alive (zombies are
        // reaped by the exit-watch task's wait()).
        let alive = std::process::Command::new("kill")
            .args(["-0", &pid])
            .status()
            .expect("kill runs")
            .success();
        assert!(!alive, "worker {pid} still alive after shutdown");
    }
}

// ---- rate limiting ----

#[tokio::test]
async fn session_rate_limit_returns_429() {
    let harness = TestHarness::builder(WORKER_BIN)
        .with_rate_limits(2, 10_000, 60_000)
        .build()
        .await;

    let url = format!("{}/messages?sessionId=sess-rl", harness.base_url);
    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
    for _ in 0..2 {
        let response = harness.http.post(&url).json(&body).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    let limited = harness.http.post(&url).json(&body).send().await.unwrap();
    assert_eq!(limited.status().as_u16(), 429);
    assert!(limited.headers().get("retry-after").is_some());

    // Health stays reachable for orchestrators.
    let snapshot = health(&harness).await;
    assert!(snapshot["status"].is_string());

    harness.shutdown().await;
}

// ---- /messages parameter validation ----

#[tokio::test]
async fn messages_without_session_id_is_400() {
    let harness = TestHarness::builder(WORKER_BIN).build().await;

    let response = harness
        .http
        .post(format!("{}/messages", harness.base_url))
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    harness.shutdown().await;
}

// ---- /tools ----

#[tokio::test]
async fn tools_endpoint_lists_worker_tools() {
    let harness = TestHarness::builder(WORKER_BIN).build().await;

    let response: Value = harness
        .http
        .get(format!("{}/tools", harness.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tools = response["tools"].as_array().expect("tools array");
    assert!(tools.iter().any(|tool| tool["name"] == "echo"));

    harness.shutdown().await;
}

/// Helper: background tasks need a cancellation token that outlives the test.
fn tokio_util_token() -> tokio_util::sync::CancellationToken {
    tokio_util::sync::CancellationToken::new()
}
