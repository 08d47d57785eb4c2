// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Portico gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages. Every field
//! has a compiled default except the three IdP credentials, which are
//! mandatory and checked during validation.

use serde::{Deserialize, Serialize};

/// Top-level Portico configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides via the `PORTICO_` prefix.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PorticoConfig {
    /// Gateway listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity provider (OAuth 2.0) settings.
    #[serde(default)]
    pub idp: IdpConfig,

    /// Worker child-process settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Session registry settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Credential storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Request rate limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Daemon behavior: logging and memory accounting.
    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// Gateway listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL, used when building the JSON-RPC reply
    /// endpoint handed to event-stream clients. `None` derives
    /// `http://{host}:{port}`.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8402
}

impl ServerConfig {
    /// The base URL clients should use to reach this gateway.
    pub fn base_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

/// Identity provider configuration.
///
/// `app_id`, `app_secret`, and `redirect_uri` have no defaults and must be
/// supplied via config file or `PORTICO_IDP_*` environment variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IdpConfig {
    /// OAuth client id issued by the IdP.
    #[serde(default)]
    pub app_id: String,

    /// OAuth client secret issued by the IdP.
    #[serde(default)]
    pub app_secret: String,

    /// Callback URL registered with the IdP.
    #[serde(default)]
    pub redirect_uri: String,

    /// Browser-facing authorization endpoint.
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,

    /// Authorization-code exchange endpoint.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Refresh-token exchange endpoint.
    #[serde(default = "default_refresh_url")]
    pub refresh_url: String,

    /// User identity endpoint.
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,

    /// Scope set requested during authorization.
    #[serde(default = "default_scope")]
    pub scope: String,
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            redirect_uri: String::new(),
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            refresh_url: default_refresh_url(),
            userinfo_url: default_userinfo_url(),
            scope: default_scope(),
        }
    }
}

fn default_authorize_url() -> String {
    "https://open.larksuite.com/open-apis/authen/v1/authorize".to_string()
}

fn default_token_url() -> String {
    "https://open.larksuite.com/open-apis/authen/v1/access_token".to_string()
}

fn default_refresh_url() -> String {
    "https://open.larksuite.com/open-apis/authen/v1/refresh_access_token".to_string()
}

fn default_userinfo_url() -> String {
    "https://open.larksuite.com/open-apis/authen/v1/user_info".to_string()
}

fn default_scope() -> String {
    "contact:user.base:readonly".to_string()
}

/// Worker child-process configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Path to the worker binary.
    #[serde(default = "default_binary_path")]
    pub binary_path: String,

    /// First port handed to per-user workers.
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Port reserved for the always-on default worker.
    #[serde(default = "default_default_port")]
    pub default_port: u16,

    /// Number of ports available above `base_port`.
    #[serde(default = "default_port_window")]
    pub port_window: u16,

    /// Maximum number of non-default workers.
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,

    /// Idle time after which a non-default worker is reaped.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Total readiness window after spawn.
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,

    /// Interval between readiness probes.
    #[serde(default = "default_readiness_poll_ms")]
    pub readiness_poll_ms: u64,

    /// Timeout for a single liveness probe.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Grace period between SIGTERM and forced kill.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// Timeout for forwarding a JSON-RPC request to a worker.
    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,

    /// Interval of the idle reaper task.
    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,

    /// Interval of the liveness sweep task.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            base_port: default_base_port(),
            default_port: default_default_port(),
            port_window: default_port_window(),
            max_instances: default_max_instances(),
            idle_timeout_ms: default_idle_timeout_ms(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
            readiness_poll_ms: default_readiness_poll_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            forward_timeout_ms: default_forward_timeout_ms(),
            reap_interval_ms: default_reap_interval_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

fn default_binary_path() -> String {
    "mcp-worker".to_string()
}

fn default_base_port() -> u16 {
    9300
}

fn default_default_port() -> u16 {
    9299
}

fn default_port_window() -> u16 {
    1000
}

fn default_max_instances() -> usize {
    20
}

fn default_idle_timeout_ms() -> u64 {
    600_000
}

fn default_readiness_timeout_ms() -> u64 {
    30_000
}

fn default_readiness_poll_ms() -> u64 {
    2_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_stop_grace_ms() -> u64 {
    5_000
}

fn default_forward_timeout_ms() -> u64 {
    30_000
}

fn default_reap_interval_ms() -> u64 {
    60_000
}

fn default_sweep_interval_ms() -> u64 {
    30_000
}

/// Session registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Maximum number of tracked sessions (LRU bound).
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle time after which a session binding expires.
    #[serde(default = "default_session_ttl_ms")]
    pub idle_ttl_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            idle_ttl_ms: default_session_ttl_ms(),
        }
    }
}

fn default_max_sessions() -> usize {
    1000
}

fn default_session_ttl_ms() -> u64 {
    86_400_000
}

/// Credential storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding per-user token directories.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// In-memory credential cache TTL.
    #[serde(default = "default_token_cache_ttl_ms")]
    pub token_cache_ttl_ms: u64,

    /// 64-hex-char AES-256 master key for sealing refresh tokens at rest.
    /// `None` generates one on first start and persists it under `data_dir`.
    #[serde(default)]
    pub master_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            token_cache_ttl_ms: default_token_cache_ttl_ms(),
            master_key: None,
        }
    }
}

fn default_data_dir() -> String {
    "./portico-data".to_string()
}

fn default_token_cache_ttl_ms() -> u64 {
    300_000
}

/// Request rate-limit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Requests allowed per session within the window.
    #[serde(default = "default_session_max_requests")]
    pub session_max_requests: u32,

    /// Requests allowed per originating IP within the window.
    #[serde(default = "default_ip_max_requests")]
    pub ip_max_requests: u32,

    /// Fixed window length.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            session_max_requests: default_session_max_requests(),
            ip_max_requests: default_ip_max_requests(),
            window_ms: default_window_ms(),
        }
    }
}

fn default_session_max_requests() -> u32 {
    120
}

fn default_ip_max_requests() -> u32 {
    300
}

fn default_window_ms() -> u64 {
    60_000
}

/// Daemon behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Heap size that triggers a memory-pressure warning.
    #[serde(default = "default_memory_warn_mb")]
    pub memory_warn_mb: u64,

    /// Heap size treated as the process memory cap.
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,

    /// Interval of the memory monitor task in seconds.
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            memory_warn_mb: default_memory_warn_mb(),
            memory_limit_mb: default_memory_limit_mb(),
            monitor_interval_secs: default_monitor_interval_secs(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_memory_warn_mb() -> u64 {
    512
}

fn default_memory_limit_mb() -> u64 {
    1024
}

fn default_monitor_interval_secs() -> u64 {
    5
}
