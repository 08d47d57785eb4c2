// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiremock helpers for stubbing the identity provider.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts successful token-exchange and refresh endpoints.
pub async fn mount_token_endpoints(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "success",
            "data": {
                "access_token": "at-test",
                "refresh_token": "rt-test",
                "expires_in": 7200,
                "token_type": "Bearer"
            }
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/refresh_access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {
                "access_token": "at-refreshed",
                "refresh_token": "rt-refreshed",
                "expires_in": 7200
            }
        })))
        .mount(server)
        .await;
}

/// Temporarily mounts the user-info endpoint answering with a specific
/// union id. The guard unmounts on drop, so multi-user flows mount one
/// guard per authorization in sequence.
pub async fn user_info_guard(server: &MockServer, union_id: &str) -> wiremock::MockGuard {
    Mock::given(method("GET"))
        .and(path("/user_info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "union_id": union_id, "name": "Test User" }
        })))
        .mount_as_scoped(server)
        .await
}

/// Mounts a complete happy-path IdP for single-user flows.
pub async fn mount_happy_idp(server: &MockServer, union_id: &str) {
    mount_token_endpoints(server).await;
    Mock::given(method("GET"))
        .and(path("/user_info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "union_id": union_id, "name": "Test User" }
        })))
        .mount(server)
        .await;
}
