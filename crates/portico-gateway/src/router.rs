// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The request router: session to worker resolution and JSON-RPC forwarding.
//!
//! A bound session routes to its user's worker, created lazily on first
//! use; creation failures (instance limit, spawn error) fall back to the
//! default worker so the caller still gets an answer. Unbound sessions go
//! straight to the default worker. All failures on the forward path are
//! normalized into JSON-RPC `-32603` responses -- this function never
//! surfaces a raw error to the HTTP layer.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use portico_core::rpc::{internal_error, request_id, JsonRpcRequest, JsonRpcResponse};
use portico_core::{fingerprint, PorticoError, WorkerStatus};
use portico_session::SessionRegistry;
use portico_supervisor::{WorkerInfo, WorkerSupervisor};

/// Soft timeout for bootstrap introspection calls from the event stream.
pub const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(3);

/// Routes JSON-RPC requests from sessions to workers.
pub struct RequestRouter {
    supervisor: Arc<WorkerSupervisor>,
    registry: Arc<SessionRegistry>,
    http: reqwest::Client,
    forward_timeout: Duration,
}

impl RequestRouter {
    /// Creates a router over the given supervisor and session registry.
    pub fn new(
        supervisor: Arc<WorkerSupervisor>,
        registry: Arc<SessionRegistry>,
        forward_timeout: Duration,
    ) -> Self {
        Self {
            supervisor,
            registry,
            http: reqwest::Client::new(),
            forward_timeout,
        }
    }

    /// Routes one JSON-RPC request for a session. Always yields a JSON-RPC
    /// response value.
    pub async fn route(&self, session_id: &str, body: Value) -> Value {
        let id = request_id(&body);
        let method = body
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        debug!(
            session_id,
            method,
            payload = fingerprint(body.to_string().as_bytes()).as_str(),
            "routing request"
        );

        let worker = match self.resolve_worker(session_id).await {
            Some(worker) => worker,
            None => {
                return serde_json::to_value(internal_error(id, "No available worker", None))
                    .expect("error response serializes");
            }
        };

        if worker.status != WorkerStatus::Running {
            return serde_json::to_value(internal_error(
                id,
                "worker not available",
                Some(json!({ "status": worker.status.to_string() })),
            ))
            .expect("error response serializes");
        }

        match self.forward(&worker, &body).await {
            Ok(response) => {
                self.supervisor.touch(&worker.instance_id).await;
                response
            }
            Err(PorticoError::RpcProtocol(detail)) => {
                warn!(
                    instance_id = worker.instance_id.as_str(),
                    detail = detail.as_str(),
                    "worker returned a non-JSON-RPC body"
                );
                serde_json::to_value(internal_error(id, "invalid response", None))
                    .expect("error response serializes")
            }
            Err(e) => {
                warn!(
                    instance_id = worker.instance_id.as_str(),
                    error = %e,
                    "worker transport failure"
                );
                self.supervisor.mark_error(&worker.instance_id).await;
                serde_json::to_value(internal_error(
                    id,
                    "worker transport error",
                    Some(json!({ "detail": e.to_string() })),
                ))
                .expect("error response serializes")
            }
        }
    }

    /// Fetches the tool list from the default worker for event-stream
    /// bootstrap. Any failure yields the documented fallback list so clients
    /// can proceed without a healthy worker.
    pub async fn bootstrap_tools(&self) -> Vec<Value> {
        match self.call_default("tools/list").await {
            Ok(result) => match result.get("tools").and_then(Value::as_array) {
                Some(tools) => tools.clone(),
                None => {
                    warn!("tools/list result missing tools array, using fallback");
                    fallback_tools()
                }
            },
            Err(e) => {
                debug!(error = %e, "tools bootstrap failed, using fallback");
                fallback_tools()
            }
        }
    }

    /// Fetches capabilities from the default worker, falling back to a
    /// fixed capabilities object.
    pub async fn bootstrap_capabilities(&self) -> Value {
        match self.call_default("initialize").await {
            Ok(result) => result,
            Err(e) => {
                debug!(error = %e, "capabilities bootstrap failed, using fallback");
                fallback_capabilities()
            }
        }
    }

    async fn resolve_worker(&self, session_id: &str) -> Option<WorkerInfo> {
        if let Some(user_id) = self.registry.user_of(session_id) {
            match self.supervisor.get_or_create(&user_id).await {
                Ok(worker) => return Some(worker),
                Err(e) => {
                    // Instance cap or spawn failure: the default worker
                    // still answers, just without the user's credentials.
                    warn!(user_id = user_id.as_str(), error = %e, "falling back to default worker");
                }
            }
        }
        self.supervisor.default_worker().await
    }

    async fn forward(&self, worker: &WorkerInfo, body: &Value) -> Result<Value, PorticoError> {
        let response = self
            .http
            .post(format!("{}/messages", worker.base_url()))
            .header("content-type", "application/json")
            .json(body)
            .timeout(self.forward_timeout)
            .send()
            .await
            .map_err(|e| PorticoError::Transport {
                message: format!("forward to worker failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let payload: Value = response.json().await.map_err(|e| PorticoError::Transport {
            message: format!("worker response was not JSON: {e}"),
            source: Some(Box::new(e)),
        })?;

        // A body without the protocol marker is a worker bug, not a
        // transport failure.
        if payload.get("jsonrpc").is_none() {
            return Err(PorticoError::RpcProtocol(
                "response missing jsonrpc field".to_string(),
            ));
        }

        Ok(payload)
    }

    /// Issues a gateway-originated call against the default worker and
    /// returns its `result` payload.
    async fn call_default(&self, method: &str) -> Result<Value, PorticoError> {
        let worker = self
            .supervisor
            .default_worker()
            .await
            .ok_or_else(|| PorticoError::Internal("no default worker".to_string()))?;
        if worker.status != WorkerStatus::Running {
            return Err(PorticoError::Transport {
                message: format!("default worker is {}", worker.status),
                source: None,
            });
        }

        let request = JsonRpcRequest::new(format!("bootstrap-{method}"), method);
        let body = serde_json::to_value(&request)
            .map_err(|e| PorticoError::Internal(e.to_string()))?;
        let payload = self.forward(&worker, &body).await?;
        let response: JsonRpcResponse = serde_json::from_value(payload)
            .map_err(|e| PorticoError::RpcProtocol(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(PorticoError::RpcProtocol(format!(
                "worker error {}: {}",
                error.code, error.message
            )));
        }
        response
            .result
            .ok_or_else(|| PorticoError::RpcProtocol("response missing result".to_string()))
    }
}

/// Documented fallback tool list served when the default worker cannot
/// answer `tools/list`.
pub fn fallback_tools() -> Vec<Value> {
    vec![
        json!({
            "name": "send_message",
            "description": "Send a message to a chat or user",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "receive_id": { "type": "string" },
                    "content": { "type": "string" }
                },
                "required": ["receive_id", "content"]
            }
        }),
        json!({
            "name": "list_chats",
            "description": "List chats visible to the authenticated user",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "search_contacts",
            "description": "Search the authenticated user's contacts",
            "inputSchema": {
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }
        }),
    ]
}

/// Fixed capabilities object served when the default worker cannot answer
/// `initialize`.
pub fn fallback_capabilities() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": "portico",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}
