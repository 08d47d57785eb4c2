// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the identity provider.
//!
//! The IdP wraps every JSON response in an envelope `{code, msg, data}`
//! where `code = 0` means success. Any non-2xx status or non-zero envelope
//! code is surfaced as an error; the `data` payload carries the actual
//! token or identity fields.

use std::time::Duration;

use portico_config::model::IdpConfig;
use portico_core::PorticoError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Timeout for all IdP calls (token exchange, refresh, user info).
const IDP_TIMEOUT: Duration = Duration::from_secs(10);

/// Response envelope used by every IdP endpoint.
#[derive(Debug, Deserialize)]
struct IdpEnvelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

/// Token payload returned by the exchange and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenData {
    /// Short-lived access token.
    pub access_token: String,
    /// Long-lived refresh token. Refresh responses may omit it, in which
    /// case the caller keeps the previous one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Identity payload returned by the user-info endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfoData {
    /// Stable identifier used as the user id everywhere in the gateway.
    pub union_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

/// HTTP client for the three IdP endpoints.
#[derive(Debug, Clone)]
pub struct IdpClient {
    http: reqwest::Client,
    config: IdpConfig,
}

impl IdpClient {
    /// Creates a client from the IdP configuration.
    pub fn new(config: IdpConfig) -> Result<Self, PorticoError> {
        let http = reqwest::Client::builder()
            .timeout(IDP_TIMEOUT)
            .build()
            .map_err(|e| PorticoError::IdpProtocol {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { http, config })
    }

    /// The IdP configuration this client talks to.
    pub fn config(&self) -> &IdpConfig {
        &self.config
    }

    /// Exchanges an authorization code for a token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenData, PorticoError> {
        let body = ExchangeRequest {
            grant_type: "authorization_code",
            client_id: &self.config.app_id,
            client_secret: &self.config.app_secret,
            code,
            redirect_uri: &self.config.redirect_uri,
        };
        let data = self
            .post_enveloped(&self.config.token_url, &body)
            .await?;
        debug!("authorization code exchanged");
        Ok(data)
    }

    /// Exchanges a refresh token for a fresh token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenData, PorticoError> {
        let body = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
        };
        let data = self
            .post_enveloped(&self.config.refresh_url, &body)
            .await?;
        debug!("access token refreshed");
        Ok(data)
    }

    /// Fetches the caller's identity using a bearer access token.
    pub async fn user_info(&self, access_token: &str) -> Result<UserInfoData, PorticoError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| PorticoError::IdpProtocol {
                message: format!("user-info request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        Self::decode_envelope(response).await
    }

    async fn post_enveloped<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, PorticoError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| PorticoError::IdpProtocol {
                message: format!("request to IdP failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        Self::decode_envelope(response).await
    }

    async fn decode_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PorticoError> {
        let status = response.status();
        if !status.is_success() {
            return Err(PorticoError::IdpProtocol {
                message: format!("IdP returned HTTP {status}"),
                source: None,
            });
        }

        let envelope: IdpEnvelope<T> =
            response.json().await.map_err(|e| PorticoError::IdpProtocol {
                message: format!("malformed IdP response: {e}"),
                source: Some(Box::new(e)),
            })?;

        if envelope.code != 0 {
            return Err(PorticoError::IdpError {
                code: envelope.code,
                message: envelope.msg,
            });
        }

        envelope.data.ok_or_else(|| PorticoError::IdpProtocol {
            message: "IdP response missing data payload".to_string(),
            source: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> IdpConfig {
        IdpConfig {
            app_id: "cli_test".to_string(),
            app_secret: "secret".to_string(),
            redirect_uri: "http://127.0.0.1:8402/oauth/callback".to_string(),
            token_url: format!("{}/access_token", server.uri()),
            refresh_url: format!("{}/refresh_access_token", server.uri()),
            userinfo_url: format!("{}/user_info", server.uri()),
            ..IdpConfig::default()
        }
    }

    #[tokio::test]
    async fn exchange_code_decodes_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access_token"))
            .and(body_partial_json(serde_json::json!({
                "grant_type": "authorization_code",
                "code": "C1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "msg": "success",
                "data": {
                    "access_token": "at-1",
                    "refresh_token": "rt-1",
                    "expires_in": 7200,
                    "token_type": "Bearer"
                }
            })))
            .mount(&server)
            .await;

        let client = IdpClient::new(config_for(&server)).unwrap();
        let data = client.exchange_code("C1").await.unwrap();
        assert_eq!(data.access_token, "at-1");
        assert_eq!(data.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(data.expires_in, 7200);
    }

    #[tokio::test]
    async fn nonzero_envelope_code_is_idp_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 20003,
                "msg": "code expired",
            })))
            .mount(&server)
            .await;

        let client = IdpClient::new(config_for(&server)).unwrap();
        let err = client.exchange_code("stale").await.unwrap_err();
        assert!(
            matches!(err, PorticoError::IdpError { code: 20003, .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn http_failure_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access_token"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = IdpClient::new(config_for(&server)).unwrap();
        let err = client.exchange_code("C1").await.unwrap_err();
        assert!(matches!(err, PorticoError::IdpProtocol { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn user_info_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user_info"))
            .and(header("authorization", "Bearer at-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": { "union_id": "on_u1", "name": "Test User" }
            })))
            .mount(&server)
            .await;

        let client = IdpClient::new(config_for(&server)).unwrap();
        let info = client.user_info("at-1").await.unwrap();
        assert_eq!(info.union_id, "on_u1");
        assert_eq!(info.name.as_deref(), Some("Test User"));
    }

    #[tokio::test]
    async fn refresh_may_omit_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh_access_token"))
            .and(body_partial_json(serde_json::json!({
                "grant_type": "refresh_token",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": { "access_token": "at-2", "expires_in": 7200 }
            })))
            .mount(&server)
            .await;

        let client = IdpClient::new(config_for(&server)).unwrap();
        let data = client.refresh("rt-1").await.unwrap();
        assert_eq!(data.access_token, "at-2");
        assert!(data.refresh_token.is_none());
    }
}
