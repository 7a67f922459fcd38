//! Bootstrap supervision for a single entry bridge.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{ProxyError, ProxyState, Readiness, TorLauncher, TorrcSpec};
use crate::bridges::BridgeLine;
use crate::config::TorConfig;

/// Fixed parameters of every bootstrap attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub tor_dir: PathBuf,
    pub transport_plugin: PathBuf,
    pub socks_port: u16,
    pub control_port: u16,
    pub bootstrap_timeout: Duration,
    pub poll_interval: Duration,
}

impl SupervisorSettings {
    /// Resolve settings from config. Fails when no transport plugin is found.
    pub fn from_config(config: &TorConfig, tor_dir: PathBuf) -> Result<Self, ProxyError> {
        let transport_plugin = config.find_transport_plugin().ok_or_else(|| {
            ProxyError::Config(
                "No pluggable transport found. Install lyrebird or obfs4proxy, or set tor.transport_plugin."
                    .to_string(),
            )
        })?;
        Ok(Self {
            tor_dir,
            transport_plugin,
            socks_port: config.socks_port,
            control_port: config.control_port,
            bootstrap_timeout: config.bootstrap_timeout(),
            poll_interval: config.poll_interval(),
        })
    }

    /// How many times the log is checked before giving up.
    pub fn poll_count(&self) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        let polls = self.bootstrap_timeout.as_millis().div_ceil(interval);
        polls.clamp(1, u32::MAX as u128) as u32
    }

    pub fn socks_url(&self) -> String {
        format!("socks5h://127.0.0.1:{}", self.socks_port)
    }

    fn torrc_spec(&self, bridge: &BridgeLine) -> TorrcSpec {
        TorrcSpec {
            bridge: bridge.clone(),
            transport_plugin: self.transport_plugin.clone(),
            socks_port: self.socks_port,
            control_port: self.control_port,
            data_dir: self.tor_dir.join("data"),
            log_path: self.tor_dir.join("tor.log"),
            torrc_path: self.tor_dir.join("torrc"),
        }
    }
}

/// A bootstrapped proxy bound to one entry bridge.
///
/// Release it with [`Supervisor::shutdown`]. Dropping the session also stops
/// the daemon through the launcher handle.
pub struct ProxySession<H> {
    handle: H,
    bridge: BridgeLine,
    socks_url: String,
}

impl<H> ProxySession<H> {
    pub fn bridge(&self) -> &BridgeLine {
        &self.bridge
    }

    pub fn socks_url(&self) -> &str {
        &self.socks_url
    }
}

/// Owns the proxy daemon across bootstrap attempts.
pub struct Supervisor<L: TorLauncher> {
    launcher: L,
    settings: SupervisorSettings,
    state: ProxyState,
}

impl<L: TorLauncher> Supervisor<L> {
    pub fn new(launcher: L, settings: SupervisorSettings) -> Self {
        Self {
            launcher,
            settings,
            state: ProxyState::Idle,
        }
    }

    pub fn state(&self) -> ProxyState {
        self.state
    }

    /// Start the proxy on `bridge` and wait for it to bootstrap.
    ///
    /// A daemon that exits while bootstrapping fails the attempt on the next
    /// check instead of waiting out the budget.
    pub async fn acquire(
        &mut self,
        bridge: &BridgeLine,
    ) -> Result<ProxySession<L::Handle>, ProxyError> {
        self.launcher.terminate_existing().await;

        self.state = ProxyState::Bootstrapping;
        let spec = self.settings.torrc_spec(bridge);
        let mut handle = match self.launcher.start(&spec).await {
            Ok(handle) => handle,
            Err(e) => {
                self.state = ProxyState::Failed;
                return Err(e);
            }
        };

        let polls = self.settings.poll_count();
        info!("Waiting for Tor to bootstrap (up to {} checks)", polls);

        for poll in 1..=polls {
            tokio::time::sleep(self.settings.poll_interval).await;
            match self.launcher.check_ready(&mut handle).await {
                Readiness::Ready => {
                    info!("Tor bootstrapped after {} check(s)", poll);
                    self.state = ProxyState::Ready;
                    return Ok(ProxySession {
                        handle,
                        bridge: bridge.clone(),
                        socks_url: self.settings.socks_url(),
                    });
                }
                Readiness::Exited(status) => {
                    self.launcher.stop(handle).await;
                    self.state = ProxyState::Failed;
                    return Err(ProxyError::Exited { status });
                }
                Readiness::Pending => {
                    debug!("Bootstrap check {}/{}: not ready", poll, polls);
                }
            }
        }

        warn!(
            "Tor did not bootstrap within {}s, stopping it",
            self.settings.bootstrap_timeout.as_secs()
        );
        self.launcher.stop(handle).await;
        self.state = ProxyState::Failed;
        Err(ProxyError::BootstrapTimeout {
            waited: self.settings.bootstrap_timeout,
        })
    }

    /// Stop the daemon behind a session.
    pub async fn shutdown(&mut self, session: ProxySession<L::Handle>) {
        self.launcher.stop(session.handle).await;
        self.state = ProxyState::Idle;
        info!("Tor proxy stopped");
    }
}
