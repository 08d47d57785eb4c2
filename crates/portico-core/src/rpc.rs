// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-RPC 2.0 envelope types.
//!
//! The gateway is mostly a pass-through proxy: request bodies are forwarded
//! to workers verbatim and responses come back as raw JSON. These types
//! exist for the two places the gateway speaks JSON-RPC itself: building
//! bootstrap introspection calls (`tools/list`, `initialize`) and
//! synthesizing error responses when no worker can answer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC internal-error code used for all gateway-synthesized failures.
pub const INTERNAL_ERROR: i64 = -32603;

/// Incoming JSON-RPC request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier.
    #[serde(default)]
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Optional parameters payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Builds a gateway-originated request (bootstrap introspection calls).
    pub fn new(id: impl Into<Value>, method: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            method: method.to_string(),
            params: None,
        }
    }
}

/// JSON-RPC response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier.
    #[serde(default)]
    pub id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Structured error metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Builds an internal-error response for a request id.
pub fn internal_error(id: Value, message: &str, data: Option<Value>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: None,
        error: Some(JsonRpcError {
            code: INTERNAL_ERROR,
            message: message.to_string(),
            data,
        }),
    }
}

/// Extracts the request id from a raw JSON-RPC body, defaulting to null.
pub fn request_id(body: &Value) -> Value {
    body.get("id").cloned().unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_without_params() {
        let req = JsonRpcRequest::new(1, "tools/list");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "tools/list");
        assert!(json.get("params").is_none());
    }

    #[test]
    fn internal_error_has_code_32603() {
        let resp = internal_error(Value::from(7), "No available worker", None);
        let err = resp.error.unwrap();
        assert_eq!(err.code, INTERNAL_ERROR);
        assert_eq!(err.message, "No available worker");
        assert_eq!(resp.id, Value::from(7));
    }

    #[test]
    fn internal_error_carries_data() {
        let resp = internal_error(
            Value::Null,
            "worker not running",
            Some(serde_json::json!({"status": "error"})),
        );
        let data = resp.error.unwrap().data.unwrap();
        assert_eq!(data["status"], "error");
    }

    #[test]
    fn request_id_defaults_to_null() {
        let body = serde_json::json!({"jsonrpc": "2.0", "method": "x"});
        assert_eq!(request_id(&body), Value::Null);
        let body = serde_json::json!({"jsonrpc": "2.0", "id": 42, "method": "x"});
        assert_eq!(request_id(&body), Value::from(42));
    }

    #[test]
    fn response_roundtrip_preserves_error() {
        let resp = internal_error(Value::from("a"), "invalid response", None);
        let text = serde_json::to_string(&resp).unwrap();
        let back: JsonRpcResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(back.error.unwrap().code, INTERNAL_ERROR);
        assert!(back.result.is_none());
    }
}
