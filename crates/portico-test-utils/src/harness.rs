// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full-stack test harness.
//!
//! Assembles the complete gateway -- credential store in a temp dir, OAuth
//! broker against a wiremock IdP, worker supervisor spawning the real
//! `mock-worker` binary, session registry, router -- and serves the HTTP
//! surface on an ephemeral port. Each harness is fully isolated; tests can
//! run in parallel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use wiremock::MockServer;
use zeroize::Zeroizing;

use portico_config::model::{IdpConfig, LimitsConfig, WorkerConfig};
use portico_credentials::CredentialStore;
use portico_gateway::{
    build_router, GatewayState, HealthState, RateLimiter, RequestRouter,
};
use portico_oauth::{IdpClient, OAuthBroker};
use portico_session::SessionRegistry;
use portico_supervisor::WorkerSupervisor;

/// Reserves an ephemeral port by binding and immediately releasing it.
///
/// There is a small reuse race, but the OS walks the ephemeral range before
/// handing the same port out again, which is plenty for tests.
pub fn pick_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .expect("local addr")
        .port()
}

/// Builder for the full-stack harness.
pub struct TestHarnessBuilder {
    worker_binary: String,
    max_instances: usize,
    idle_timeout_ms: u64,
    reap_interval_ms: u64,
    sweep_interval_ms: u64,
    session_max_requests: u32,
    ip_max_requests: u32,
    window_ms: u64,
}

impl TestHarnessBuilder {
    fn new(worker_binary: String) -> Self {
        Self {
            worker_binary,
            max_instances: 20,
            idle_timeout_ms: 600_000,
            reap_interval_ms: 60_000,
            sweep_interval_ms: 30_000,
            session_max_requests: 10_000,
            ip_max_requests: 10_000,
            window_ms: 60_000,
        }
    }

    /// Caps the number of non-default workers.
    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }

    /// Shortens the idle reap cycle for lifecycle tests.
    pub fn with_idle_reaping(mut self, idle_timeout_ms: u64, reap_interval_ms: u64) -> Self {
        self.idle_timeout_ms = idle_timeout_ms;
        self.reap_interval_ms = reap_interval_ms;
        self
    }

    /// Shortens the liveness sweep cycle.
    pub fn with_sweep_interval(mut self, sweep_interval_ms: u64) -> Self {
        self.sweep_interval_ms = sweep_interval_ms;
        self
    }

    /// Tightens the request rate limits.
    pub fn with_rate_limits(mut self, session_max: u32, ip_max: u32, window_ms: u64) -> Self {
        self.session_max_requests = session_max;
        self.ip_max_requests = ip_max;
        self.window_ms = window_ms;
        self
    }

    /// Builds the harness and brings the gateway up.
    pub async fn build(self) -> TestHarness {
        let data_dir = tempfile::TempDir::new().expect("temp data dir");
        let idp_server = MockServer::start().await;

        let default_port = pick_free_port();
        let base_port = pick_free_port();

        let worker_config = WorkerConfig {
            binary_path: self.worker_binary.clone(),
            base_port,
            default_port,
            port_window: 200,
            max_instances: self.max_instances,
            idle_timeout_ms: self.idle_timeout_ms,
            readiness_timeout_ms: 10_000,
            readiness_poll_ms: 100,
            probe_timeout_ms: 1_000,
            stop_grace_ms: 1_000,
            forward_timeout_ms: 5_000,
            reap_interval_ms: self.reap_interval_ms,
            sweep_interval_ms: self.sweep_interval_ms,
        };

        let idp_config = IdpConfig {
            app_id: "cli_harness".to_string(),
            app_secret: "harness-secret".to_string(),
            redirect_uri: "http://127.0.0.1/oauth/callback".to_string(),
            authorize_url: format!("{}/authorize", idp_server.uri()),
            token_url: format!("{}/access_token", idp_server.uri()),
            refresh_url: format!("{}/refresh_access_token", idp_server.uri()),
            userinfo_url: format!("{}/user_info", idp_server.uri()),
            ..IdpConfig::default()
        };

        let store = Arc::new(CredentialStore::new(
            data_dir.path().to_path_buf(),
            Zeroizing::new(portico_credentials::crypto::generate_random_key().unwrap()),
            Duration::from_secs(60),
        ));
        let broker = Arc::new(OAuthBroker::new(
            IdpClient::new(idp_config).expect("idp client"),
            Arc::clone(&store),
        ));
        let registry = Arc::new(SessionRegistry::new(1000, Duration::from_secs(24 * 3600)));
        let supervisor = Arc::new(WorkerSupervisor::new(
            worker_config,
            data_dir.path().to_path_buf(),
            "cli_harness".to_string(),
            "harness-secret".to_string(),
        ));
        supervisor
            .initialize()
            .await
            .expect("default worker starts");

        let router = Arc::new(RequestRouter::new(
            Arc::clone(&supervisor),
            Arc::clone(&registry),
            Duration::from_secs(5),
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind gateway");
        let addr = listener.local_addr().expect("gateway addr");
        let base_url = format!("http://{addr}");

        let state = GatewayState {
            router,
            registry: Arc::clone(&registry),
            broker: Arc::clone(&broker),
            supervisor: Arc::clone(&supervisor),
            limiter: Arc::new(RateLimiter::new(&LimitsConfig {
                session_max_requests: self.session_max_requests,
                ip_max_requests: self.ip_max_requests,
                window_ms: self.window_ms,
            })),
            base_url: base_url.clone(),
            health: HealthState {
                start_time: std::time::Instant::now(),
                memory_snapshot: None,
            },
        };

        let app = build_router(state);
        let server = tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
            )
            .await;
        });

        TestHarness {
            base_url,
            default_port,
            base_port,
            http: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .expect("http client"),
            supervisor,
            registry,
            broker,
            store,
            idp_server,
            data_dir,
            server,
        }
    }
}

/// A running gateway with all of its collaborators exposed.
pub struct TestHarness {
    /// Gateway base URL (ephemeral port).
    pub base_url: String,
    /// Port of the default worker.
    pub default_port: u16,
    /// First port of the per-user worker range.
    pub base_port: u16,
    /// Client with redirects disabled (OAuth tests inspect Location).
    pub http: reqwest::Client,
    /// Worker supervisor.
    pub supervisor: Arc<WorkerSupervisor>,
    /// Session registry.
    pub registry: Arc<SessionRegistry>,
    /// OAuth broker.
    pub broker: Arc<OAuthBroker>,
    /// Credential store.
    pub store: Arc<CredentialStore>,
    /// Wiremock IdP.
    pub idp_server: MockServer,
    /// Data directory (token dirs, master key).
    pub data_dir: tempfile::TempDir,
    server: tokio::task::JoinHandle<()>,
}

impl TestHarness {
    /// Starts a harness builder. `worker_binary` is usually
    /// `env!("CARGO_BIN_EXE_mock-worker")`.
    pub fn builder(worker_binary: &str) -> TestHarnessBuilder {
        TestHarnessBuilder::new(worker_binary.to_string())
    }

    /// Data directory path.
    pub fn data_path(&self) -> PathBuf {
        self.data_dir.path().to_path_buf()
    }

    /// Drives `/oauth/start` for a session and returns the `state` value
    /// from the IdP redirect.
    pub async fn oauth_state_for(&self, session_id: &str) -> String {
        let response = self
            .http
            .get(format!(
                "{}/oauth/start?sessionId={session_id}",
                self.base_url
            ))
            .send()
            .await
            .expect("oauth start");
        assert_eq!(response.status().as_u16(), 302, "expected IdP redirect");

        let location = response
            .headers()
            .get("location")
            .expect("Location header")
            .to_str()
            .expect("utf-8 location")
            .to_string();
        let url = reqwest::Url::parse(&location).expect("authorize url");
        url.query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .expect("state param")
    }

    /// Stops the gateway and all workers.
    pub async fn shutdown(self) {
        self.supervisor.shutdown().await;
        self.server.abort();
    }
}
