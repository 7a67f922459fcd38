//! Starting and stopping the C-Tor client.
//!
//! The client reads a generated torrc that pins one entry bridge and writes
//! its notice log to a file. Readiness is detected by scanning that file for
//! the bootstrap marker.

use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{ProxyError, BOOTSTRAP_MARKER};
use crate::bridges::BridgeLine;
use crate::config::TorConfig;

/// Everything needed to write a torrc for one bootstrap attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrcSpec {
    pub bridge: BridgeLine,
    pub transport_plugin: PathBuf,
    pub socks_port: u16,
    pub control_port: u16,
    pub data_dir: PathBuf,
    pub log_path: PathBuf,
    pub torrc_path: PathBuf,
}

/// Result of one bootstrap check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    /// The daemon is gone; further checks cannot succeed.
    Exited(String),
}

/// Control surface of the proxy daemon.
#[async_trait]
pub trait TorLauncher: Send + Sync {
    /// Handle to one running daemon. Dropping it must stop the daemon.
    type Handle: Send;

    /// Stop any instance left over from an earlier run.
    async fn terminate_existing(&self);

    /// Write the torrc and launch the daemon.
    async fn start(&self, spec: &TorrcSpec) -> Result<Self::Handle, ProxyError>;

    /// Check whether the daemon has finished bootstrapping.
    async fn check_ready(&self, handle: &mut Self::Handle) -> Readiness;

    /// Stop the daemon.
    async fn stop(&self, handle: Self::Handle);
}

/// Render the torrc for a bootstrap attempt.
pub fn generate_torrc(spec: &TorrcSpec) -> String {
    format!(
        r#"# bridgefetch Tor client configuration
# Auto-generated - do not edit manually

DataDirectory {data_dir}
SocksPort {socks_port}
ControlPort {control_port}

UseBridges 1
ClientTransportPlugin obfs4,webtunnel exec {plugin}
Bridge {bridge}

Log notice file {log_path}
SafeLogging 1
"#,
        data_dir = spec.data_dir.display(),
        socks_port = spec.socks_port,
        control_port = spec.control_port,
        plugin = spec.transport_plugin.display(),
        bridge = spec.bridge,
        log_path = spec.log_path.display(),
    )
}

/// Launches the system `tor` binary.
#[derive(Debug, Clone)]
pub struct CTorLauncher {
    tor_binary: PathBuf,
    process_name: String,
}

/// A running `tor` child process.
pub struct CTorHandle {
    process: Option<Child>,
    log_path: PathBuf,
}

impl CTorHandle {
    fn shutdown(&mut self) {
        if let Some(mut process) = self.process.take() {
            debug!("Stopping Tor process {}", process.id());
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}

impl Drop for CTorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl CTorLauncher {
    pub fn new(tor_binary: PathBuf, process_name: impl Into<String>) -> Self {
        Self {
            tor_binary,
            process_name: process_name.into(),
        }
    }

    /// Locate the tor binary from configuration or PATH.
    pub fn from_config(config: &TorConfig) -> Result<Self, ProxyError> {
        let tor_binary = config.find_tor_binary().ok_or_else(|| {
            ProxyError::Config(
                "Tor binary not found. Install tor or set tor.tor_binary in config.".to_string(),
            )
        })?;
        Ok(Self::new(tor_binary, config.process_name.clone()))
    }
}

#[async_trait]
impl TorLauncher for CTorLauncher {
    type Handle = CTorHandle;

    async fn terminate_existing(&self) {
        match tokio::process::Command::new("pkill")
            .arg("-x")
            .arg(&self.process_name)
            .status()
            .await
        {
            // pkill exits 1 when nothing matched
            Ok(status) if status.success() => {
                info!("Terminated stale {} process", self.process_name);
                // Give the old instance time to release its ports
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
            Ok(_) => debug!("No stale {} process running", self.process_name),
            Err(e) => warn!("Could not run pkill: {}", e),
        }
    }

    async fn start(&self, spec: &TorrcSpec) -> Result<Self::Handle, ProxyError> {
        fs::create_dir_all(&spec.data_dir).map_err(|e| {
            ProxyError::Config(format!(
                "Cannot create Tor data directory {}: {}",
                spec.data_dir.display(),
                e
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&spec.data_dir, fs::Permissions::from_mode(0o700));
        }

        if spec.log_path.exists() {
            fs::remove_file(&spec.log_path).map_err(|e| {
                ProxyError::Config(format!(
                    "Cannot remove stale log {}: {}",
                    spec.log_path.display(),
                    e
                ))
            })?;
        }

        fs::write(&spec.torrc_path, generate_torrc(spec)).map_err(|e| {
            ProxyError::Config(format!(
                "Cannot write torrc {}: {}",
                spec.torrc_path.display(),
                e
            ))
        })?;
        debug!("Tor config: {}", spec.torrc_path.display());

        let process = Command::new(&self.tor_binary)
            .arg("-f")
            .arg(&spec.torrc_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ProxyError::Launch(format!("{}: {}", self.tor_binary.display(), e)))?;

        info!("Started Tor (pid {})", process.id());

        Ok(CTorHandle {
            process: Some(process),
            log_path: spec.log_path.clone(),
        })
    }

    async fn check_ready(&self, handle: &mut Self::Handle) -> Readiness {
        if let Some(ref mut process) = handle.process {
            if let Ok(Some(status)) = process.try_wait() {
                warn!("Tor exited early with {}", status);
                handle.process = None;
                return Readiness::Exited(status.to_string());
            }
        }
        match tokio::fs::read_to_string(&handle.log_path).await {
            Ok(log) if log.contains(BOOTSTRAP_MARKER) => Readiness::Ready,
            _ => Readiness::Pending,
        }
    }

    async fn stop(&self, mut handle: Self::Handle) {
        handle.shutdown();
    }
}
