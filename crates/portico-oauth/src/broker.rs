// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The OAuth broker: pending authorization state, code exchange, and
//! pre-emptive refresh.
//!
//! The `state` parameter sent to the IdP is `{state_token}_{session_id}`.
//! The random token half proves the callback belongs to a flow this gateway
//! started; the session half lets the callback re-associate the browser
//! with its event-stream session even if in-memory state was lost. Session
//! ids never contain underscores, so splitting at the last underscore is
//! unambiguous.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use portico_core::PorticoError;
use portico_credentials::{CredentialStore, UserCredentials};

use crate::idp::IdpClient;

/// Pending authorizations older than this are rejected and swept.
const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Interval of the background state sweeper.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Access tokens within this margin of expiry are refreshed before use.
const REFRESH_MARGIN: chrono::Duration = chrono::Duration::minutes(5);

/// A not-yet-consumed authorization flow.
#[derive(Debug, Clone)]
struct PendingAuth {
    session_id: String,
    created_at: Instant,
}

/// OAuth 2.0 broker against the external identity provider.
pub struct OAuthBroker {
    idp: IdpClient,
    store: Arc<CredentialStore>,
    pending: DashMap<String, PendingAuth>,
    rng: SystemRandom,
}

impl OAuthBroker {
    /// Creates a broker backed by the given IdP client and credential store.
    pub fn new(idp: IdpClient, store: Arc<CredentialStore>) -> Self {
        Self {
            idp,
            store,
            pending: DashMap::new(),
            rng: SystemRandom::new(),
        }
    }

    /// Builds the IdP authorization URL for a session and records the
    /// pending state.
    pub fn authorize_url(&self, session_id: &str) -> Result<String, PorticoError> {
        let mut token_bytes = [0u8; 32];
        self.rng
            .fill(&mut token_bytes)
            .map_err(|_| PorticoError::Internal("failed to generate state token".to_string()))?;
        let state_token = hex::encode(token_bytes);

        self.pending.insert(
            state_token.clone(),
            PendingAuth {
                session_id: session_id.to_string(),
                created_at: Instant::now(),
            },
        );

        let config = self.idp.config();
        let mut url = Url::parse(&config.authorize_url).map_err(|e| {
            PorticoError::Config(format!("invalid idp.authorize_url: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("app_id", &config.app_id)
            .append_pair("redirect_uri", &config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &config.scope)
            .append_pair("state", &format!("{state_token}_{session_id}"));

        debug!(session_id, "authorization URL issued");
        Ok(url.into())
    }

    /// Completes the authorization-code flow.
    ///
    /// Consumes the state token (one use only), exchanges the code, resolves
    /// the user's identity, and persists credentials. Returns the session id
    /// recovered from the state and the IdP's stable user id.
    pub async fn handle_callback(
        &self,
        code: &str,
        state: &str,
    ) -> Result<(String, String), PorticoError> {
        let (state_token, session_id) = split_state(state)?;

        // Removing the entry is the consumption point: a replayed state
        // finds nothing and fails here.
        let pending = self
            .pending
            .remove(state_token)
            .map(|(_, pending)| pending)
            .ok_or(PorticoError::InvalidState)?;

        if pending.session_id != session_id {
            warn!("state session mismatch, rejecting callback");
            return Err(PorticoError::InvalidState);
        }
        if pending.created_at.elapsed() > STATE_TTL {
            return Err(PorticoError::InvalidState);
        }

        let tokens = self.idp.exchange_code(code).await?;
        let identity = self.idp.user_info(&tokens.access_token).await?;
        let user_id = identity.union_id;

        let credentials = UserCredentials {
            user_id: user_id.clone(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token.unwrap_or_default(),
            expires_at: Utc::now() + chrono::Duration::seconds(tokens.expires_in),
        };
        self.store.save(&user_id, &credentials).await?;

        info!(user_id = user_id.as_str(), session_id, "authorization completed");
        Ok((session_id.to_string(), user_id))
    }

    /// Returns credentials guaranteed to outlive the refresh margin, or
    /// `None` when the user has no usable credentials.
    ///
    /// A failed refresh evicts the cache entry so the next attempt re-reads
    /// disk instead of trusting a stale in-memory copy.
    pub async fn ensure_valid(&self, user_id: &str) -> Option<UserCredentials> {
        let credentials = self.store.load(user_id).await?;

        if credentials.expires_at - Utc::now() > REFRESH_MARGIN {
            return Some(credentials);
        }

        match self.refresh(user_id).await {
            Ok(refreshed) => Some(refreshed),
            Err(e) => {
                warn!(user_id, error = %e, "token refresh failed");
                self.store.evict_cached(user_id);
                None
            }
        }
    }

    /// Refreshes the user's token pair at the IdP and persists the result.
    ///
    /// When the IdP omits a new refresh token, the prior one is kept.
    pub async fn refresh(&self, user_id: &str) -> Result<UserCredentials, PorticoError> {
        let current = self
            .store
            .load(user_id)
            .await
            .ok_or_else(|| PorticoError::NoCredentials {
                user_id: user_id.to_string(),
            })?;

        let tokens = self.idp.refresh(&current.refresh_token).await?;

        let credentials = UserCredentials {
            user_id: user_id.to_string(),
            access_token: tokens.access_token,
            refresh_token: tokens
                .refresh_token
                .unwrap_or_else(|| current.refresh_token.clone()),
            expires_at: Utc::now() + chrono::Duration::seconds(tokens.expires_in),
        };
        self.store.save(user_id, &credentials).await?;

        debug!(user_id, "credentials refreshed");
        Ok(credentials)
    }

    /// Number of pending (unconsumed) authorization flows.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Spawns the background sweeper that evicts expired pending state.
    pub fn spawn_state_sweeper(self: &Arc<Self>, cancel: CancellationToken) {
        let broker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let before = broker.pending.len();
                        broker
                            .pending
                            .retain(|_, pending| pending.created_at.elapsed() <= STATE_TTL);
                        let swept = before - broker.pending.len();
                        if swept > 0 {
                            debug!(swept, "expired authorization state evicted");
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("state sweeper shutting down");
                        break;
                    }
                }
            }
        });
    }
}

/// Splits `{state_token}_{session_id}` at the last underscore.
fn split_state(state: &str) -> Result<(&str, &str), PorticoError> {
    let split_at = state.rfind('_').ok_or(PorticoError::InvalidState)?;
    let (token, session) = (&state[..split_at], &state[split_at + 1..]);
    if token.is_empty() || session.is_empty() {
        return Err(PorticoError::InvalidState);
    }
    Ok((token, session))
}
