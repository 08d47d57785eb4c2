// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Standalone mock worker binary spawned by the supervisor in integration
//! tests.
//!
//! Accepts the gateway's spawn contract
//! (`serve --transport http --port N --idp-app-id … --idp-app-secret …
//! --token-dir D`), writes a pid marker into the token directory so tests
//! can verify which directory it was handed, and serves the shared mock
//! worker app until killed.

use std::path::PathBuf;

use portico_test_utils::mock_worker::{mock_worker_app, MockWorkerIdentity};

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let port: u16 = arg_value(&args, "--port")
        .and_then(|p| p.parse().ok())
        .expect("--port is required");
    let token_dir = PathBuf::from(
        arg_value(&args, "--token-dir").expect("--token-dir is required"),
    );

    // Leave a trace for tests: which directory this worker owns.
    let _ = std::fs::create_dir_all(&token_dir);
    let _ = std::fs::write(
        token_dir.join("worker.pid"),
        std::process::id().to_string(),
    );

    let app = mock_worker_app(MockWorkerIdentity {
        token_dir: token_dir.display().to_string(),
    });

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("bind worker port");

    axum::serve(listener, app).await.expect("serve mock worker");
}
