// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A trivial loopback worker: health endpoint plus a JSON-RPC echo.
//!
//! Answers `tools/list` and `initialize` with fixed payloads and echoes any
//! other method back in the result. Shared between the in-process handle
//! used by unit tests and the `mock-worker` binary the supervisor spawns in
//! integration tests.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Tool descriptors the mock worker reports on `tools/list`.
pub fn mock_tools() -> Vec<Value> {
    vec![
        json!({
            "name": "echo",
            "description": "Echo the given text back",
            "inputSchema": {
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }
        }),
        json!({
            "name": "whoami",
            "description": "Report which token directory this worker serves",
            "inputSchema": { "type": "object", "properties": {} }
        }),
    ]
}

/// Identity baked into every response so tests can tell workers apart.
#[derive(Debug, Clone, Default)]
pub struct MockWorkerIdentity {
    /// Token directory this worker was started with.
    pub token_dir: String,
}

/// Builds the mock worker's axum router.
pub fn mock_worker_app(identity: MockWorkerIdentity) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/messages", post(messages))
        .with_state(identity)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn messages(
    State(identity): State<MockWorkerIdentity>,
    Json(request): Json<Value>,
) -> Json<Value> {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let result = match method {
        "tools/list" => json!({ "tools": mock_tools() }),
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "mock-worker", "version": "0.0.0" }
        }),
        other => json!({
            "echo": other,
            "params": request.get("params").cloned().unwrap_or(Value::Null),
            "token_dir": identity.token_dir,
        }),
    };

    Json(json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    }))
}

/// An in-process mock worker bound to an ephemeral port.
pub struct MockWorkerHandle {
    /// Port the worker listens on.
    pub port: u16,
    join: tokio::task::JoinHandle<()>,
}

impl MockWorkerHandle {
    /// Stops the in-process worker.
    pub fn abort(self) {
        self.join.abort();
    }
}

/// Serves the mock worker app on 127.0.0.1:0 and returns its handle.
pub async fn spawn_mock_worker(identity: MockWorkerIdentity) -> MockWorkerHandle {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock worker");
    let port = listener.local_addr().expect("local addr").port();
    let app = mock_worker_app(identity);

    let join = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockWorkerHandle { port, join }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_worker_answers_health_and_tools() {
        let handle = spawn_mock_worker(MockWorkerIdentity::default()).await;
        let client = reqwest::Client::new();
        let base = format!("http://127.0.0.1:{}", handle.port);

        let health = client.get(format!("{base}/health")).send().await.unwrap();
        assert!(health.status().is_success());

        let response: Value = client
            .post(format!("{base}/messages"))
            .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["jsonrpc"], "2.0");
        assert_eq!(response["id"], 1);
        assert!(response["result"]["tools"].as_array().unwrap().len() >= 2);

        handle.abort();
    }

    #[tokio::test]
    async fn unknown_methods_echo() {
        let handle = spawn_mock_worker(MockWorkerIdentity {
            token_dir: "/tmp/tok".to_string(),
        })
        .await;
        let client = reqwest::Client::new();

        let response: Value = client
            .post(format!("http://127.0.0.1:{}/messages", handle.port))
            .json(&json!({"jsonrpc": "2.0", "id": 7, "method": "tools/call", "params": {"x": 1}}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["result"]["echo"], "tools/call");
        assert_eq!(response["result"]["params"]["x"], 1);
        assert_eq!(response["result"]["token_dir"], "/tmp/tok");

        handle.abort();
    }
}
