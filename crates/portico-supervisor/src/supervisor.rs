// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The worker lifecycle supervisor.
//!
//! One table of workers behind one async mutex. The lock covers bookkeeping
//! only: reservations, status transitions, port accounting. Everything that
//! can block -- spawning children, HTTP probes, waiting for exits -- happens
//! outside the lock and publishes its outcome back through it.
//!
//! Each child process is owned by a single exit-watch task that drives
//! `child.wait()` and records the terminal state. Termination signals go
//! through the pid, so no other task ever needs the `Child` handle.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use portico_config::model::WorkerConfig;
use portico_core::{PorticoError, WorkerStatus};
use portico_credentials::{default_dir, user_dir};

use crate::ports;
use crate::worker::{
    ensure_token_dir, signal_process, SpawnSpec, WorkerEntry, WorkerInfo, SIGNAL_KILL,
    SIGNAL_TERM,
};

/// Poll interval while waiting for a worker another caller is starting.
const WAIT_POLL: Duration = Duration::from_millis(100);

/// Outcome of the table reservation step in `get_or_create`.
enum Plan {
    /// Another caller is already starting this user's worker.
    WaitFor(String),
    /// We reserved a slot and must spawn the child ourselves.
    Spawn {
        instance_id: String,
        port: u16,
        token_dir: PathBuf,
    },
}

/// Aggregate worker counters exposed on the health endpoint.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStats {
    /// All table entries, default included.
    pub total_instances: usize,
    /// Non-default entries.
    pub user_instances: usize,
    /// Entries currently in `running`.
    pub running_instances: usize,
    /// Status of the default worker slot.
    pub default_instance_status: String,
}

struct SupervisorState {
    workers: HashMap<String, WorkerEntry>,
    by_user: HashMap<String, String>,
    default_id: Option<String>,
}

impl SupervisorState {
    fn user_instance_count(&self) -> usize {
        self.workers
            .values()
            .filter(|entry| entry.info.user_id.is_some())
            .count()
    }

    fn used_ports(&self) -> HashSet<u16> {
        self.workers
            .values()
            .filter(|entry| entry.info.status.is_live())
            .map(|entry| entry.info.port)
            .collect()
    }

    fn remove_bookkeeping(&mut self, instance_id: &str) {
        if let Some(entry) = self.workers.remove(instance_id) {
            if let Some(ref user_id) = entry.info.user_id {
                self.by_user.remove(user_id);
            }
        }
    }
}

/// Spawns, probes, reaps, and terminates worker child processes.
pub struct WorkerSupervisor {
    config: WorkerConfig,
    data_dir: PathBuf,
    idp_app_id: String,
    idp_app_secret: String,
    state: Arc<Mutex<SupervisorState>>,
    http: reqwest::Client,
}

impl WorkerSupervisor {
    /// Creates a supervisor. No worker is spawned until [`initialize`].
    ///
    /// [`initialize`]: WorkerSupervisor::initialize
    pub fn new(
        config: WorkerConfig,
        data_dir: PathBuf,
        idp_app_id: String,
        idp_app_secret: String,
    ) -> Self {
        Self {
            config,
            data_dir,
            idp_app_id,
            idp_app_secret,
            state: Arc::new(Mutex::new(SupervisorState {
                workers: HashMap::new(),
                by_user: HashMap::new(),
                default_id: None,
            })),
            http: reqwest::Client::new(),
        }
    }

    /// Ensures the data directory exists and brings up the default worker.
    ///
    /// Failure here is a startup failure: the gateway cannot serve
    /// unauthenticated traffic without the default worker.
    pub async fn initialize(&self) -> Result<(), PorticoError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| PorticoError::SpawnFailed {
            message: format!("failed to create data dir {}", self.data_dir.display()),
            source: Some(Box::new(e)),
        })?;

        let token_dir = default_dir(&self.data_dir);
        let instance_id = new_instance_id();
        {
            let mut state = self.state.lock().await;
            state.workers.insert(
                instance_id.clone(),
                WorkerEntry::new(WorkerInfo {
                    instance_id: instance_id.clone(),
                    user_id: None,
                    port: self.config.default_port,
                    status: WorkerStatus::Starting,
                    created_at: Utc::now(),
                    token_dir: token_dir.clone(),
                }),
            );
            state.default_id = Some(instance_id.clone());
        }

        let info = self
            .spawn_and_await_ready(&instance_id, self.config.default_port, token_dir, true)
            .await?;
        info!(
            instance_id = info.instance_id.as_str(),
            port = info.port,
            "default worker ready"
        );
        Ok(())
    }

    /// Returns the running worker for a user, creating one on demand.
    ///
    /// A concurrent caller that finds the user's worker mid-startup waits
    /// for it rather than spawning a duplicate, preserving the one-running-
    /// worker-per-user invariant.
    pub async fn get_or_create(&self, user_id: &str) -> Result<WorkerInfo, PorticoError> {
        let plan = {
            let mut state = self.state.lock().await;

            if let Some(instance_id) = state.by_user.get(user_id).cloned() {
                let status = state
                    .workers
                    .get(&instance_id)
                    .map(|entry| entry.info.status);
                match status {
                    Some(WorkerStatus::Running) => {
                        let entry = state
                            .workers
                            .get_mut(&instance_id)
                            .expect("entry checked above");
                        entry.last_activity = Instant::now();
                        return Ok(entry.info.clone());
                    }
                    Some(WorkerStatus::Starting) => Plan::WaitFor(instance_id),
                    Some(WorkerStatus::Stopping) => {
                        // Port still held; let the stop finish and the next
                        // request spawn a fresh worker.
                        return Err(PorticoError::SpawnFailed {
                            message: format!("worker for {user_id} is stopping"),
                            source: None,
                        });
                    }
                    Some(WorkerStatus::Stopped) | Some(WorkerStatus::Error) | None => {
                        // Dead entry: replace it lazily.
                        state.remove_bookkeeping(&instance_id);
                        self.reserve_locked(&mut state, user_id)?
                    }
                }
            } else {
                self.reserve_locked(&mut state, user_id)?
            }
        };

        match plan {
            Plan::WaitFor(instance_id) => self.await_running(&instance_id).await,
            Plan::Spawn {
                instance_id,
                port,
                token_dir,
            } => {
                self.spawn_and_await_ready(&instance_id, port, token_dir, false)
                    .await
            }
        }
    }

    /// Gracefully stops a worker: SIGTERM now, SIGKILL after the grace
    /// period if it has not exited.
    pub async fn stop(&self, instance_id: &str) -> Result<(), PorticoError> {
        let pid = {
            let mut state = self.state.lock().await;
            let entry = state.workers.get_mut(instance_id).ok_or_else(|| {
                PorticoError::Internal(format!("unknown worker instance {instance_id}"))
            })?;
            if !entry.info.status.is_live() {
                return Ok(());
            }
            entry.info.status = WorkerStatus::Stopping;
            entry.pid
        };

        debug!(instance_id, "stopping worker");
        if let Some(pid) = pid {
            signal_process(pid, SIGNAL_TERM);
        }

        let state = Arc::clone(&self.state);
        let instance_id = instance_id.to_string();
        let grace = Duration::from_millis(self.config.stop_grace_ms);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let lingering = {
                let state = state.lock().await;
                state
                    .workers
                    .get(&instance_id)
                    .filter(|entry| entry.info.status == WorkerStatus::Stopping)
                    .and_then(|entry| entry.pid)
            };
            if let Some(pid) = lingering {
                warn!(
                    instance_id = instance_id.as_str(),
                    "worker ignored SIGTERM, force killing"
                );
                signal_process(pid, SIGNAL_KILL);
            }
        });

        Ok(())
    }

    /// Probes a worker's health endpoint with a bounded timeout.
    pub async fn health(&self, instance_id: &str) -> bool {
        let port = {
            let state = self.state.lock().await;
            state.workers.get(instance_id).map(|entry| entry.info.port)
        };
        match port {
            Some(port) => self.probe(port).await,
            None => false,
        }
    }

    /// Updates a worker's last-activity stamp (called on every forward).
    pub async fn touch(&self, instance_id: &str) {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.workers.get_mut(instance_id) {
            entry.last_activity = Instant::now();
        }
    }

    /// Marks a worker as failed (transport error observed by the router).
    pub async fn mark_error(&self, instance_id: &str) {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.workers.get_mut(instance_id) {
            if entry.info.status.is_live() {
                warn!(instance_id, "worker marked as failed");
                entry.info.status = WorkerStatus::Error;
            }
        }
    }

    /// Snapshot of the default worker slot.
    pub async fn default_worker(&self) -> Option<WorkerInfo> {
        let state = self.state.lock().await;
        let id = state.default_id.clone()?;
        state.workers.get(&id).map(|entry| entry.info.clone())
    }

    /// Snapshot of any worker by instance id.
    pub async fn worker_info(&self, instance_id: &str) -> Option<WorkerInfo> {
        let state = self.state.lock().await;
        state
            .workers
            .get(instance_id)
            .map(|entry| entry.info.clone())
    }

    /// Aggregate counters for the health endpoint.
    pub async fn stats(&self) -> InstanceStats {
        let state = self.state.lock().await;
        let default_status = state
            .default_id
            .as_ref()
            .and_then(|id| state.workers.get(id))
            .map(|entry| entry.info.status.to_string())
            .unwrap_or_else(|| "absent".to_string());
        InstanceStats {
            total_instances: state.workers.len(),
            user_instances: state.user_instance_count(),
            running_instances: state
                .workers
                .values()
                .filter(|entry| entry.info.status == WorkerStatus::Running)
                .count(),
            default_instance_status: default_status,
        }
    }

    /// Spawns the idle reaper and the liveness sweep.
    pub fn spawn_background_tasks(self: &Arc<Self>, cancel: CancellationToken) {
        let reaper = Arc::clone(self);
        let reaper_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(reaper.config.reap_interval_ms));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => reaper.reap_idle().await,
                    _ = reaper_cancel.cancelled() => {
                        debug!("idle reaper shutting down");
                        break;
                    }
                }
            }
        });

        let sweeper = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(sweeper.config.sweep_interval_ms));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => sweeper.sweep_liveness().await,
                    _ = cancel.cancelled() => {
                        debug!("liveness sweep shutting down");
                        break;
                    }
                }
            }
        });
    }

    /// Stops every worker (default last) and waits for the children to exit.
    pub async fn shutdown(&self) {
        info!("supervisor shutting down");

        let (user_instances, default_instance) = {
            let state = self.state.lock().await;
            let users: Vec<String> = state
                .workers
                .values()
                .filter(|entry| entry.info.user_id.is_some() && entry.info.status.is_live())
                .map(|entry| entry.info.instance_id.clone())
                .collect();
            (users, state.default_id.clone())
        };

        for instance_id in &user_instances {
            let _ = self.stop(instance_id).await;
        }
        self.await_terminated(&user_instances).await;

        if let Some(default_id) = default_instance {
            let _ = self.stop(&default_id).await;
            self.await_terminated(std::slice::from_ref(&default_id)).await;
        }

        info!("all workers terminated");
    }

    // ---- internals ----

    /// Reserves a table slot and port for a new user worker. Caller holds
    /// the lock; the reservation pins both the user index entry and the
    /// port until the spawn either publishes `Running` or tears down.
    fn reserve_locked(
        &self,
        state: &mut SupervisorState,
        user_id: &str,
    ) -> Result<Plan, PorticoError> {
        if state.user_instance_count() >= self.config.max_instances {
            return Err(PorticoError::MaxInstances {
                limit: self.config.max_instances,
            });
        }

        let port = ports::allocate(
            self.config.base_port,
            self.config.port_window,
            &state.used_ports(),
        )?;
        let token_dir = user_dir(&self.data_dir, user_id);
        let instance_id = new_instance_id();

        state.workers.insert(
            instance_id.clone(),
            WorkerEntry::new(WorkerInfo {
                instance_id: instance_id.clone(),
                user_id: Some(user_id.to_string()),
                port,
                status: WorkerStatus::Starting,
                created_at: Utc::now(),
                token_dir: token_dir.clone(),
            }),
        );
        state.by_user.insert(user_id.to_string(), instance_id.clone());

        Ok(Plan::Spawn {
            instance_id,
            port,
            token_dir,
        })
    }

    async fn await_running(&self, instance_id: &str) -> Result<WorkerInfo, PorticoError> {
        let deadline =
            Instant::now() + Duration::from_millis(self.config.readiness_timeout_ms);
        loop {
            {
                let mut state = self.state.lock().await;
                match state.workers.get_mut(instance_id) {
                    Some(entry) => match entry.info.status {
                        WorkerStatus::Running => {
                            entry.last_activity = Instant::now();
                            return Ok(entry.info.clone());
                        }
                        WorkerStatus::Starting => {}
                        _ => {
                            return Err(PorticoError::SpawnFailed {
                                message: "worker failed while starting".to_string(),
                                source: None,
                            })
                        }
                    },
                    None => {
                        return Err(PorticoError::SpawnFailed {
                            message: "worker disappeared while starting".to_string(),
                            source: None,
                        })
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(PorticoError::Timeout {
                    duration: Duration::from_millis(self.config.readiness_timeout_ms),
                });
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    /// Spawns the child for a reserved entry and waits for readiness.
    async fn spawn_and_await_ready(
        &self,
        instance_id: &str,
        port: u16,
        token_dir: PathBuf,
        is_default: bool,
    ) -> Result<WorkerInfo, PorticoError> {
        if let Err(e) = ensure_token_dir(&token_dir) {
            self.teardown_failed(instance_id, None).await;
            return Err(e);
        }

        let spec = SpawnSpec {
            binary_path: self.config.binary_path.clone(),
            port,
            idp_app_id: self.idp_app_id.clone(),
            idp_app_secret: self.idp_app_secret.clone(),
            token_dir,
        };
        let mut child = match spec.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.teardown_failed(instance_id, None).await;
                return Err(e);
            }
        };
        let pid = child.id();

        {
            let mut state = self.state.lock().await;
            if let Some(entry) = state.workers.get_mut(instance_id) {
                entry.pid = pid;
            }
        }

        // The exit-watch task is the sole owner of the Child handle.
        {
            let state = Arc::clone(&self.state);
            let instance_id = instance_id.to_string();
            tokio::spawn(async move {
                let exit = child.wait().await;
                let mut state = state.lock().await;
                let Some(entry) = state.workers.get_mut(&instance_id) else {
                    return;
                };
                match entry.info.status {
                    WorkerStatus::Stopping | WorkerStatus::Stopped => {
                        entry.info.status = WorkerStatus::Stopped;
                        debug!(
                            instance_id = instance_id.as_str(),
                            "worker exited after stop"
                        );
                        if !is_default {
                            state.remove_bookkeeping(&instance_id);
                        }
                    }
                    _ => {
                        match exit {
                            Ok(status) => warn!(
                                instance_id = instance_id.as_str(),
                                code = status.code().unwrap_or(-1),
                                "worker exited unexpectedly"
                            ),
                            Err(ref e) => warn!(
                                instance_id = instance_id.as_str(),
                                error = %e,
                                "worker wait failed"
                            ),
                        }
                        entry.info.status = WorkerStatus::Error;
                        if is_default {
                            error!("default worker is down; unauthenticated traffic degraded");
                        }
                    }
                }
            });
        }

        debug!(instance_id, port, "worker spawned, probing readiness");

        match self.await_ready(instance_id, port).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                let entry = state.workers.get_mut(instance_id).ok_or_else(|| {
                    PorticoError::SpawnFailed {
                        message: "worker disappeared during readiness".to_string(),
                        source: None,
                    }
                })?;
                if entry.info.status != WorkerStatus::Starting {
                    return Err(PorticoError::SpawnFailed {
                        message: format!(
                            "worker failed during readiness ({})",
                            entry.info.status
                        ),
                        source: None,
                    });
                }
                entry.info.status = WorkerStatus::Running;
                entry.last_activity = Instant::now();
                info!(instance_id, port, "worker running");
                Ok(entry.info.clone())
            }
            Err(e) => {
                self.teardown_failed(instance_id, pid).await;
                Err(e)
            }
        }
    }

    /// Polls the worker's health endpoint until ready.
    ///
    /// A child that dies during the wait fails readiness. A child that is
    /// still alive when the window closes is accepted best-effort; the
    /// liveness sweep will catch it if it never becomes healthy.
    async fn await_ready(&self, instance_id: &str, port: u16) -> Result<(), PorticoError> {
        let deadline =
            Instant::now() + Duration::from_millis(self.config.readiness_timeout_ms);
        let poll = Duration::from_millis(self.config.readiness_poll_ms);

        loop {
            if self.probe_with_timeout(port, poll).await {
                return Ok(());
            }

            let status = {
                let state = self.state.lock().await;
                state
                    .workers
                    .get(instance_id)
                    .map(|entry| entry.info.status)
            };
            match status {
                Some(WorkerStatus::Starting) => {}
                Some(WorkerStatus::Stopping) | Some(WorkerStatus::Stopped)
                | Some(WorkerStatus::Error) | None => {
                    return Err(PorticoError::SpawnFailed {
                        message: "worker child exited before becoming ready".to_string(),
                        source: None,
                    });
                }
                Some(WorkerStatus::Running) => return Ok(()),
            }

            if Instant::now() >= deadline {
                warn!(
                    instance_id,
                    port, "readiness window elapsed with child alive, accepting best-effort"
                );
                return Ok(());
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Removes a failed reservation and kills its child if one was spawned.
    async fn teardown_failed(&self, instance_id: &str, pid: Option<u32>) {
        if let Some(pid) = pid {
            signal_process(pid, SIGNAL_KILL);
        }
        let mut state = self.state.lock().await;
        state.remove_bookkeeping(instance_id);
    }

    async fn reap_idle(&self) {
        let idle_timeout = Duration::from_millis(self.config.idle_timeout_ms);
        let (to_stop, to_drop) = {
            let state = self.state.lock().await;
            let mut to_stop = Vec::new();
            let mut to_drop = Vec::new();
            for entry in state.workers.values() {
                if entry.info.user_id.is_none() {
                    continue;
                }
                if entry.last_activity.elapsed() <= idle_timeout {
                    continue;
                }
                match entry.info.status {
                    WorkerStatus::Running | WorkerStatus::Starting => {
                        to_stop.push(entry.info.instance_id.clone());
                    }
                    WorkerStatus::Error | WorkerStatus::Stopped => {
                        to_drop.push(entry.info.instance_id.clone());
                    }
                    WorkerStatus::Stopping => {}
                }
            }
            (to_stop, to_drop)
        };

        for instance_id in to_stop {
            info!(
                instance_id = instance_id.as_str(),
                "reaping idle worker"
            );
            let _ = self.stop(&instance_id).await;
        }
        if !to_drop.is_empty() {
            let mut state = self.state.lock().await;
            for instance_id in to_drop {
                state.remove_bookkeeping(&instance_id);
            }
        }
    }

    async fn sweep_liveness(&self) {
        let running: Vec<(String, u16)> = {
            let state = self.state.lock().await;
            state
                .workers
                .values()
                .filter(|entry| entry.info.status == WorkerStatus::Running)
                .map(|entry| (entry.info.instance_id.clone(), entry.info.port))
                .collect()
        };

        for (instance_id, port) in running {
            if self.probe(port).await {
                self.touch(&instance_id).await;
            } else {
                self.mark_error(&instance_id).await;
            }
        }
    }

    async fn probe(&self, port: u16) -> bool {
        self.probe_with_timeout(port, Duration::from_millis(self.config.probe_timeout_ms))
            .await
    }

    async fn probe_with_timeout(&self, port: u16, timeout: Duration) -> bool {
        self.http
            .get(format!("http://127.0.0.1:{port}/health"))
            .timeout(timeout)
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    async fn await_terminated(&self, instance_ids: &[String]) {
        let deadline = Instant::now()
            + Duration::from_millis(self.config.stop_grace_ms)
            + Duration::from_secs(2);
        loop {
            let lingering = {
                let state = self.state.lock().await;
                instance_ids
                    .iter()
                    .filter(|id| {
                        state
                            .workers
                            .get(*id)
                            .map(|entry| entry.info.status.is_live())
                            .unwrap_or(false)
                    })
                    .count()
            };
            if lingering == 0 {
                return;
            }
            if Instant::now() >= deadline {
                let state = self.state.lock().await;
                for id in instance_ids {
                    if let Some(entry) = state.workers.get(id) {
                        if let Some(pid) = entry.pid {
                            signal_process(pid, SIGNAL_KILL);
                        }
                    }
                }
                return;
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }
}

fn new_instance_id() -> String {
    format!("w-{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_supervisor(dir: &std::path::Path, binary: &str) -> Arc<WorkerSupervisor> {
        let config = WorkerConfig {
            binary_path: binary.to_string(),
            base_port: 39300,
            default_port: 39299,
            readiness_timeout_ms: 2_000,
            readiness_poll_ms: 100,
            stop_grace_ms: 500,
            ..WorkerConfig::default()
        };
        Arc::new(WorkerSupervisor::new(
            config,
            dir.to_path_buf(),
            "cli_test".to_string(),
            "secret".to_string(),
        ))
    }

    #[tokio::test]
    async fn empty_supervisor_reports_absent_default() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = test_supervisor(dir.path(), "/nonexistent/worker");

        let stats = supervisor.stats().await;
        assert_eq!(stats.total_instances, 0);
        assert_eq!(stats.user_instances, 0);
        assert_eq!(stats.default_instance_status, "absent");
    }

    #[tokio::test]
    async fn spawn_failure_cleans_up_reservation() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = test_supervisor(dir.path(), "/nonexistent/worker");

        let err = supervisor.get_or_create("u1").await.unwrap_err();
        assert!(matches!(err, PorticoError::SpawnFailed { .. }));

        // Reservation rolled back: no lingering entry, port freed.
        let stats = supervisor.stats().await;
        assert_eq!(stats.total_instances, 0);
        assert_eq!(stats.user_instances, 0);
    }

    #[tokio::test]
    async fn initialize_with_missing_binary_is_startup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = test_supervisor(dir.path(), "/nonexistent/worker");

        assert!(supervisor.initialize().await.is_err());
    }

    #[tokio::test]
    async fn instance_stats_serialize_camel_case() {
        let stats = InstanceStats {
            total_instances: 3,
            user_instances: 2,
            running_instances: 3,
            default_instance_status: "running".to_string(),
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalInstances"], 3);
        assert_eq!(json["userInstances"], 2);
        assert_eq!(json["runningInstances"], 3);
        assert_eq!(json["defaultInstanceStatus"], "running");
    }

    #[tokio::test]
    async fn stop_unknown_instance_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = test_supervisor(dir.path(), "/nonexistent/worker");
        assert!(supervisor.stop("w-ghost").await.is_err());
    }

    #[tokio::test]
    async fn health_of_unknown_instance_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = test_supervisor(dir.path(), "/nonexistent/worker");
        assert!(!supervisor.health("w-ghost").await);
    }
}
