// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event-stream endpoint.
//!
//! On open the client immediately gets a comment line (so proxies flush the
//! response headers), then a `metadata` event with its session id, reply
//! endpoint, authentication state, tool list, and -- when unauthenticated --
//! an authorization URL, then a `capabilities` event. Events are plain
//! `data:` frames whose JSON payload carries a `type` discriminator.
//! Keepalive comments flow every 30 seconds until the client disconnects.
//!
//! Bootstrap introspection runs in a spawned task so the headers and the
//! first comment are never blocked on a slow worker; each subcall has a
//! soft timeout with a hard-coded fallback.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use portico_core::generate_session_id;

use crate::router::{fallback_capabilities, BOOTSTRAP_TIMEOUT};
use crate::server::GatewayState;

/// Keepalive interval for open event streams.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Query parameters for `GET /sse`.
#[derive(Debug, Deserialize)]
pub struct SseParams {
    /// Existing session to resume; a fresh one is allocated when absent.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// GET /sse
///
/// Opens the long-lived downstream channel for a session.
pub async fn sse_handler(
    State(state): State<GatewayState>,
    Query(params): Query<SseParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = params
        .session_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(generate_session_id);
    state.registry.touch(&session_id);
    debug!(session_id = session_id.as_str(), "event stream opened");

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);
    tokio::spawn(bootstrap_events(state, session_id, tx));

    // The immediate comment flushes headers before any bootstrap work runs.
    let stream = stream::iter([Ok(Event::default().comment("connected"))])
        .chain(ReceiverStream::new(rx));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEPALIVE_INTERVAL)
            .text("keepalive"),
    )
}

/// Gathers bootstrap data and emits the `metadata` and `capabilities`
/// events. A dropped receiver (client disconnect) aborts the remaining
/// work at the next send.
async fn bootstrap_events(
    state: GatewayState,
    session_id: String,
    tx: mpsc::Sender<Result<Event, Infallible>>,
) {
    let tools = tokio::time::timeout(BOOTSTRAP_TIMEOUT, state.router.bootstrap_tools())
        .await
        .unwrap_or_default();

    let authenticated = state.registry.is_authenticated(&session_id);
    let mut metadata = json!({
        "type": "metadata",
        "endpoint": format!("{}/messages?sessionId={session_id}", state.base_url),
        "session_id": session_id,
        "authenticated": authenticated,
        "tools": tools,
    });
    if !authenticated {
        if let Ok(url) = state.broker.authorize_url(&session_id) {
            metadata["oauth_url"] = json!(url);
        }
    }

    if tx
        .send(Ok(Event::default().data(metadata.to_string())))
        .await
        .is_err()
    {
        debug!(session_id = session_id.as_str(), "client gone before metadata");
        return;
    }

    let capabilities =
        tokio::time::timeout(BOOTSTRAP_TIMEOUT, state.router.bootstrap_capabilities())
            .await
            .unwrap_or_else(|_| fallback_capabilities());
    let payload = json!({
        "type": "capabilities",
        "capabilities": capabilities,
    });

    if tx
        .send(Ok(Event::default().data(payload.to_string())))
        .await
        .is_err()
    {
        debug!(
            session_id = session_id.as_str(),
            "client gone before capabilities"
        );
    }
}
