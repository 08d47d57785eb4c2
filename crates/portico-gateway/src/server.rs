// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway. The
//! health endpoint lives outside the rate limiter so orchestrators can
//! always probe it.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self as axum_middleware, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::debug;

use portico_core::PorticoError;
use portico_oauth::OAuthBroker;
use portico_session::SessionRegistry;
use portico_supervisor::WorkerSupervisor;

use crate::handlers;
use crate::rate_limit::{RateLimitDecision, RateLimiter};
use crate::router::RequestRouter;
use crate::sse;

/// Process memory snapshot rendered on the health endpoint.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    /// Allocator-reported heap bytes.
    pub heap_bytes: u64,
    /// Allocator-reported resident bytes.
    pub resident_bytes: u64,
    /// OS-reported RSS bytes.
    pub rss_bytes: u64,
}

/// Health state for the health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Memory snapshot provider injected by the binary (jemalloc stats).
    pub memory_snapshot: Option<Arc<dyn Fn() -> MemorySnapshot + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// JSON-RPC request router.
    pub router: Arc<RequestRouter>,
    /// Session registry.
    pub registry: Arc<SessionRegistry>,
    /// OAuth broker.
    pub broker: Arc<OAuthBroker>,
    /// Worker supervisor (for health counters).
    pub supervisor: Arc<WorkerSupervisor>,
    /// Request rate limiter.
    pub limiter: Arc<RateLimiter>,
    /// Externally reachable base URL for endpoint construction.
    pub base_url: String,
    /// Health state.
    pub health: HealthState,
}

/// Builds the gateway router over the shared state.
pub fn build_router(state: GatewayState) -> Router {
    // Health stays reachable even for rate-limited callers.
    let health_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/sse", get(sse::sse_handler))
        .route("/messages", post(handlers::post_messages))
        .route("/tools", get(handlers::get_tools))
        .route("/oauth/start", get(handlers::oauth_start))
        .route("/oauth/callback", get(handlers::oauth_callback))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(health_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
}

/// Starts the gateway HTTP server and serves until the future is dropped.
pub async fn start_server(
    bind_addr: SocketAddr,
    state: GatewayState,
) -> Result<(), PorticoError> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| PorticoError::Internal(format!("failed to bind gateway to {bind_addr}: {e}")))?;

    tracing::info!(addr = %bind_addr, "gateway listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| PorticoError::Internal(format!("gateway server error: {e}")))
}

/// Middleware enforcing the request rate limits.
///
/// The limiter key is the session id when the request names one, the
/// originating IP otherwise.
pub async fn rate_limit_middleware(
    State(state): State<GatewayState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let session_id = query_param(request.uri().query(), "sessionId");

    match state.limiter.check(session_id.as_deref(), peer.ip()) {
        RateLimitDecision::Allow => next.run(request).await,
        RateLimitDecision::Limited { retry_after_ms } => {
            debug!(
                peer = %peer.ip(),
                has_session = session_id.is_some(),
                "request rate limited"
            );
            let retry_after_secs = retry_after_ms.div_ceil(1000).max(1);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                Json(serde_json::json!({
                    "error": "rate limit exceeded",
                    "retry_after_ms": retry_after_ms,
                })),
            )
                .into_response()
        }
    }
}

/// Pulls one parameter out of a raw query string. Session ids are opaque
/// URL-safe tokens, so no percent-decoding is needed.
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_param_finds_session_id() {
        assert_eq!(
            query_param(Some("sessionId=abc&x=1"), "sessionId"),
            Some("abc".to_string())
        );
        assert_eq!(
            query_param(Some("x=1&sessionId=abc"), "sessionId"),
            Some("abc".to_string())
        );
        assert_eq!(query_param(Some("x=1"), "sessionId"), None);
        assert_eq!(query_param(Some("sessionId="), "sessionId"), None);
        assert_eq!(query_param(None, "sessionId"), None);
    }

    #[test]
    fn memory_snapshot_serializes_camel_case() {
        let snapshot = MemorySnapshot {
            heap_bytes: 1,
            resident_bytes: 2,
            rss_bytes: 3,
        };
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["heapBytes"], 1);
        assert_eq!(json["residentBytes"], 2);
        assert_eq!(json["rssBytes"], 3);
    }
}
