// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway surface.
//!
//! Handles POST /messages, GET /tools, the OAuth start/callback pair, and
//! GET /health. The OAuth endpoints render minimal HTML pages; everything
//! else speaks JSON. No handler ever surfaces internal state or a stack
//! trace to the client.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use portico_core::PorticoError;
use portico_session::SessionStats;
use portico_supervisor::InstanceStats;

use crate::server::{GatewayState, MemorySnapshot};

/// Query parameters for POST /messages.
#[derive(Debug, Deserialize)]
pub struct MessagesParams {
    /// Target session; mandatory.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Query parameters for GET /oauth/start.
#[derive(Debug, Deserialize)]
pub struct OAuthStartParams {
    /// Session to bind after the flow completes; mandatory.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Query parameters for GET /oauth/callback.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    /// Authorization code from the IdP.
    pub code: Option<String>,
    /// State parameter echoed by the IdP.
    pub state: Option<String>,
    /// IdP-reported error, mutually exclusive with `code`.
    pub error: Option<String>,
}

/// Error response body for JSON endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// POST /messages?sessionId=…
///
/// Forwards one JSON-RPC request to the session's worker. The router
/// normalizes every failure into a JSON-RPC error response, so this
/// handler only rejects requests missing their session id.
pub async fn post_messages(
    State(state): State<GatewayState>,
    Query(params): Query<MessagesParams>,
    Json(body): Json<Value>,
) -> Response {
    let Some(session_id) = params.session_id.filter(|s| !s.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "sessionId query parameter is required".to_string(),
            }),
        )
            .into_response();
    };

    let response = state.router.route(&session_id, body).await;
    Json(response).into_response()
}

/// GET /tools
///
/// Returns the default worker's tool list (or the fallback list).
pub async fn get_tools(State(state): State<GatewayState>) -> Json<Value> {
    let tools = state.router.bootstrap_tools().await;
    Json(serde_json::json!({ "tools": tools }))
}

/// GET /oauth/start?sessionId=…
///
/// Bounces the browser to the IdP authorization page.
pub async fn oauth_start(
    State(state): State<GatewayState>,
    Query(params): Query<OAuthStartParams>,
) -> Response {
    let Some(session_id) = params.session_id.filter(|s| !s.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "sessionId query parameter is required".to_string(),
            }),
        )
            .into_response();
    };

    match state.broker.authorize_url(&session_id) {
        Ok(url) => (
            StatusCode::FOUND,
            [(header::LOCATION, url)],
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "failed to build authorization URL");
            html_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authorization could not be started. Please try again.",
            )
        }
    }
}

/// GET /oauth/callback
///
/// Completes the authorization flow: consumes the state, exchanges the
/// code, binds the session, and tells the user to close the window.
pub async fn oauth_callback(
    State(state): State<GatewayState>,
    Query(params): Query<OAuthCallbackParams>,
) -> Response {
    if let Some(idp_error) = params.error {
        warn!(idp_error = idp_error.as_str(), "IdP reported authorization error");
        return html_error(
            StatusCode::BAD_REQUEST,
            "The identity provider reported an error. Please retry authorization.",
        );
    }

    let (Some(code), Some(state_param)) = (params.code, params.state) else {
        return html_error(
            StatusCode::BAD_REQUEST,
            "Missing code or state parameter.",
        );
    };

    match state.broker.handle_callback(&code, &state_param).await {
        Ok((session_id, user_id)) => {
            state.registry.bind(&session_id, &user_id);
            html_page(
                StatusCode::OK,
                "Authorization successful",
                "Authorization successful. You can close this window and return \
                 to your client.",
            )
        }
        Err(PorticoError::InvalidState) => html_error(
            StatusCode::BAD_REQUEST,
            "Invalid or expired state. Please restart authorization.",
        ),
        Err(e @ PorticoError::IdpError { .. }) | Err(e @ PorticoError::IdpProtocol { .. }) => {
            warn!(error = %e, "IdP exchange failed");
            html_error(
                StatusCode::BAD_GATEWAY,
                "The identity provider could not complete the authorization.",
            )
        }
        Err(e) => {
            warn!(error = %e, "authorization callback failed");
            html_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authorization failed. Please try again.",
            )
        }
    }
}

/// Health snapshot body for GET /health.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "healthy" while the default worker is running.
    pub status: String,
    /// RFC 3339 timestamp of this snapshot.
    pub timestamp: String,
    /// Gateway version.
    pub version: String,
    /// Seconds since the gateway started.
    pub uptime: u64,
    /// Process memory snapshot.
    pub memory: MemorySnapshot,
    /// Worker table counters.
    pub instances: InstanceStats,
    /// Session registry counters.
    pub sessions: SessionStats,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let instances = state.supervisor.stats().await;
    let sessions = state.registry.stats();
    let status = if instances.default_instance_status == "running" {
        "healthy"
    } else {
        "unhealthy"
    };
    let memory = state
        .health
        .memory_snapshot
        .as_ref()
        .map(|snapshot| snapshot())
        .unwrap_or_default();

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.health.start_time.elapsed().as_secs(),
        memory,
        instances,
        sessions,
    })
}

fn html_page(status: StatusCode, title: &str, body: &str) -> Response {
    let page = format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body style=\"font-family: sans-serif; max-width: 32rem; margin: 4rem auto;\">\n\
         <h1>{title}</h1>\n<p>{body}</p>\n</body>\n</html>\n"
    );
    (status, Html(page)).into_response()
}

fn html_error(status: StatusCode, body: &str) -> Response {
    html_page(status, "Authorization failed", body)
}
