//! The [`GatewayManager`] itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use atom_gateway_types::config::{ChannelType, GatewayConfig};
use atom_gateway_types::{
    ChannelDescriptor, ENV_CHANNEL_CONFIG, ENV_GLOBAL_CONFIG, ENV_SERVER_URL,
};

use crate::envfile::load_env_file;
use crate::error::ManagerError;
use crate::logfile::{ChannelLogFile, LogStream};
use crate::selector::ChannelSelector;

/// Environment variable overriding where plugin executables are found.
/// Without it, plugins are resolved as siblings of the current
/// executable.
pub const PLUGIN_DIR_ENV: &str = "ATOM_MESSAGE_GATEWAY_PLUGIN_DIR";

/// Health poll step while waiting for a plugin to come up.
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Live supervision state of one channel.
#[derive(Debug)]
struct ChannelRuntime {
    descriptor: ChannelDescriptor,
    base_url: String,
    running: bool,
    error: Option<String>,
    pid: Option<u32>,
    log: Option<Arc<ChannelLogFile>>,
    kill: CancellationToken,
    watcher: Option<JoinHandle<()>>,
}

impl ChannelRuntime {
    fn new(descriptor: ChannelDescriptor) -> Self {
        let base_url = descriptor.endpoint.base_url();
        Self {
            descriptor,
            base_url,
            running: false,
            error: None,
            pid: None,
            log: None,
            kill: CancellationToken::new(),
            watcher: None,
        }
    }
}

/// Read-only snapshot of one channel's supervision state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStateSnapshot {
    /// Channel id.
    pub id: String,
    /// Channel type.
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    /// Whether the channel is enabled in config.
    pub enabled: bool,
    /// Whether the plugin process is up and healthy.
    pub running: bool,
    /// Plugin endpoint base URL.
    pub endpoint: String,
    /// Plugin process id, when alive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Last supervision error, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate gateway status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    /// Whether the gateway is enabled at all.
    pub enabled: bool,
    /// Inbound path of the host surface.
    pub inbound_path: String,
    /// How many channels the manager registered on start.
    pub configured: usize,
    /// How many plugins are currently running.
    pub running: usize,
    /// How many channels carry a supervision error.
    pub failed: usize,
    /// Per-channel detail.
    pub channels: Vec<ChannelStateSnapshot>,
}

/// Supervisor owning every channel plugin subprocess.
///
/// Single instance per gateway process. All state mutations happen on the
/// manager's control path (start, stop, the per-channel exit watcher);
/// status reads take a snapshot.
#[derive(Debug)]
pub struct GatewayManager {
    workspace: PathBuf,
    config: GatewayConfig,
    server_url: Option<String>,
    http: reqwest::Client,
    env_file: OnceLock<HashMap<String, String>>,
    states: Arc<RwLock<HashMap<String, ChannelRuntime>>>,
    stopping: Arc<AtomicBool>,
}

impl GatewayManager {
    /// Load and validate the workspace config, then build a manager.
    /// Config errors are fatal here -- the manager never starts partial.
    pub fn create(
        workspace: impl Into<PathBuf>,
        config_override: Option<&Path>,
    ) -> Result<Self, ManagerError> {
        let workspace = workspace.into();
        let config = GatewayConfig::load(&workspace, config_override)?;
        Ok(Self {
            workspace,
            config,
            server_url: None,
            http: reqwest::Client::new(),
            env_file: OnceLock::new(),
            states: Arc::new(RwLock::new(HashMap::new())),
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The loaded gateway config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Set the task runtime base URL handed to every plugin. Must happen
    /// before [`start`](GatewayManager::start).
    pub fn set_server_url(&mut self, url: impl Into<String>) {
        self.server_url = Some(url.into());
    }

    /// Start every selected channel, health-gating each plugin.
    ///
    /// Startup failures of individual plugins are recorded in the state
    /// map and do not abort the rest; `start` itself only fails on
    /// control-path errors (missing server URL).
    pub async fn start(&self, selector: &ChannelSelector) -> Result<(), ManagerError> {
        let Some(server_url) = self.server_url.clone() else {
            return Err(ManagerError::ServerUrlNotSet);
        };

        if !self.config.enabled {
            info!("message gateway disabled, nothing to start");
            return Ok(());
        }

        let selected: Vec<ChannelDescriptor> = selector
            .select(&self.config.channels)
            .into_iter()
            .cloned()
            .collect();

        for descriptor in &selected {
            self.start_channel(descriptor.clone(), &server_url).await;
        }

        let running = {
            let map = self.states.read().await;
            map.values().filter(|s| s.running).count()
        };
        info!(
            "started {} configured channel(s), running={}",
            selected.len(),
            running
        );
        Ok(())
    }

    async fn start_channel(&self, descriptor: ChannelDescriptor, server_url: &str) {
        let id = descriptor.id.clone();
        let health_url = format!(
            "{}{}",
            descriptor.endpoint.base_url(),
            descriptor.endpoint.health_path
        );
        let startup_timeout_ms = descriptor.endpoint.startup_timeout_ms;

        {
            let mut map = self.states.write().await;
            map.insert(id.clone(), ChannelRuntime::new(descriptor.clone()));
        }

        let log = match ChannelLogFile::create(&self.workspace, &id) {
            Ok(log) => Arc::new(log),
            Err(e) => {
                self.record_failure(&id, format!("failed to open log file: {e}"))
                    .await;
                return;
            }
        };
        {
            let mut map = self.states.write().await;
            if let Some(state) = map.get_mut(&id) {
                state.log = Some(Arc::clone(&log));
            }
        }

        let exe = match plugin_executable(descriptor.channel_type) {
            Ok(exe) => exe,
            Err(e) => {
                log.append(LogStream::System, &format!("plugin resolution failed: {e}"));
                self.record_failure(&id, e.to_string()).await;
                return;
            }
        };

        let descriptor_json = match serde_json::to_string(&descriptor) {
            Ok(json) => json,
            Err(e) => {
                self.record_failure(&id, format!("failed to encode descriptor: {e}"))
                    .await;
                return;
            }
        };

        let mut cmd = Command::new(&exe);
        // Inherited process env wins over `.env` for overlapping keys.
        for (key, value) in self.env_file_vars() {
            if std::env::var_os(key).is_none() {
                cmd.env(key, value);
            }
        }
        cmd.env(ENV_CHANNEL_CONFIG, descriptor_json)
            .env(
                ENV_GLOBAL_CONFIG,
                self.config.global_config_json().to_string(),
            )
            .env(ENV_SERVER_URL, server_url)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        log.append(
            LogStream::System,
            &format!("spawning {} for channel {id}", exe.display()),
        );

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let msg = format!("failed to spawn {}: {e}", exe.display());
                log.append(LogStream::System, &msg);
                self.record_failure(&id, msg).await;
                return;
            }
        };

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            spawn_pump(stdout, Arc::clone(&log), LogStream::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_pump(stderr, Arc::clone(&log), LogStream::Stderr);
        }

        let kill = {
            let mut map = self.states.write().await;
            let Some(state) = map.get_mut(&id) else { return };
            state.pid = pid;
            state.kill.clone()
        };

        let watcher = {
            let states = Arc::clone(&self.states);
            let stopping = Arc::clone(&self.stopping);
            let log = Arc::clone(&log);
            let id = id.clone();
            let kill = kill.clone();
            tokio::spawn(async move {
                // The select borrows the child for `wait`; the kill path
                // re-borrows only after the select expression ends.
                let natural_exit = tokio::select! {
                    status = child.wait() => Some(status),
                    _ = kill.cancelled() => None,
                };
                let status = match natural_exit {
                    Some(status) => status,
                    None => {
                        let _ = child.start_kill();
                        child.wait().await
                    }
                };

                let msg = match status {
                    Ok(status) => {
                        format!("process exited with code {}", status.code().unwrap_or(-1))
                    }
                    Err(e) => format!("failed to await process exit: {e}"),
                };
                log.append(LogStream::System, &msg);
                log.close();

                let mut map = states.write().await;
                if let Some(state) = map.get_mut(&id) {
                    state.running = false;
                    state.pid = None;
                    state.error.get_or_insert(msg.clone());
                    state.log = None;
                }
                drop(map);

                if !stopping.load(Ordering::SeqCst) {
                    warn!(channel_id = %id, "{msg}");
                }
            })
        };
        {
            let mut map = self.states.write().await;
            if let Some(state) = map.get_mut(&id) {
                state.watcher = Some(watcher);
            }
        }

        match self
            .wait_for_channel_health(&health_url, startup_timeout_ms)
            .await
        {
            Ok(()) => {
                log.append(LogStream::System, "channel healthy");
                let mut map = self.states.write().await;
                if let Some(state) = map.get_mut(&id) {
                    state.running = true;
                    state.error = None;
                }
                info!(channel_id = %id, pid = ?pid, "channel started");
            }
            Err(last_error) => {
                log.append(
                    LogStream::System,
                    &format!("health gate failed after {startup_timeout_ms}ms: {last_error}"),
                );
                self.record_failure(&id, last_error).await;
                kill.cancel();
            }
        }
    }

    /// Poll the plugin's health route every 200 ms until a 2xx response
    /// or the startup deadline. Returns the last error on timeout.
    async fn wait_for_channel_health(&self, url: &str, timeout_ms: u64) -> Result<(), String> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut last_error;
        loop {
            match self.http.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    last_error = format!("health returned HTTP {}", response.status());
                }
                Err(e) => last_error = e.to_string(),
            }
            if Instant::now() >= deadline {
                return Err(last_error);
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    async fn record_failure(&self, id: &str, error: String) {
        warn!(channel_id = %id, error = %error, "channel failed");
        let mut map = self.states.write().await;
        if let Some(state) = map.get_mut(id) {
            state.running = false;
            state.error = Some(error);
        }
    }

    /// Snapshot the live supervision state.
    pub async fn status(&self) -> GatewayStatus {
        let map = self.states.read().await;
        let channels: Vec<ChannelStateSnapshot> = self
            .config
            .channels
            .iter()
            .filter_map(|descriptor| map.get(&descriptor.id))
            .map(|state| ChannelStateSnapshot {
                id: state.descriptor.id.clone(),
                channel_type: state.descriptor.channel_type,
                enabled: state.descriptor.enabled,
                running: state.running,
                endpoint: state.base_url.clone(),
                pid: state.pid,
                error: state.error.clone(),
            })
            .collect();

        GatewayStatus {
            enabled: self.config.enabled,
            inbound_path: self.config.inbound_path.clone(),
            configured: channels.len(),
            running: channels.iter().filter(|c| c.running).count(),
            failed: channels.iter().filter(|c| c.error.is_some()).count(),
            channels,
        }
    }

    /// Kill every supervised plugin and wait for the processes to exit.
    /// Idempotent.
    pub async fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);

        let watchers: Vec<JoinHandle<()>> = {
            let mut map = self.states.write().await;
            map.values_mut()
                .filter_map(|state| {
                    if let Some(log) = &state.log {
                        log.append(LogStream::System, "stop requested");
                    }
                    state.kill.cancel();
                    state.watcher.take()
                })
                .collect()
        };
        for watcher in watchers {
            let _ = watcher.await;
        }

        // The exit watcher closes the log of every channel whose process
        // ran; channels that never spawned still hold a handle.
        {
            let mut map = self.states.write().await;
            for state in map.values_mut() {
                if let Some(log) = state.log.take() {
                    log.close();
                }
            }
        }
        info!("message gateway stopped");
    }

    fn env_file_vars(&self) -> &HashMap<String, String> {
        self.env_file
            .get_or_init(|| load_env_file(&self.workspace.join(".env")))
    }
}

/// Map a channel type to its plugin executable.
fn plugin_executable(channel_type: ChannelType) -> Result<PathBuf, ManagerError> {
    let name = match channel_type {
        ChannelType::Telegram => "atom-gateway-telegram",
        ChannelType::Http => "atom-gateway-http",
    };

    if let Ok(dir) = std::env::var(PLUGIN_DIR_ENV) {
        let dir = dir.trim();
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir).join(name));
        }
    }

    let current = std::env::current_exe()?;
    let dir = current.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(name))
}

/// Pump one child stream into the log, line by line.
fn spawn_pump(
    reader: impl AsyncRead + Unpin + Send + 'static,
    log: Arc<ChannelLogFile>,
    stream: LogStream,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            log.append(stream, &line);
        }
    })
}
