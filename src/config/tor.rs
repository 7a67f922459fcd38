//! Configuration for the supervised Tor process.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default Tor SOCKS port.
pub const DEFAULT_SOCKS_PORT: u16 = 9050;

/// Default Tor control port.
pub const DEFAULT_CONTROL_PORT: u16 = 9051;

/// Default bootstrap budget in seconds (18 polls at the default interval).
pub const DEFAULT_BOOTSTRAP_TIMEOUT_SECS: u64 = 180;

/// Default delay between log polls in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Names tried, in order, when looking for a pluggable transport binary.
const TRANSPORT_PLUGIN_NAMES: &[&str] = &["lyrebird", "obfs4proxy"];

/// Tor process configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorConfig {
    /// Path to tor binary (default: search PATH for "tor").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tor_binary: Option<PathBuf>,

    /// Path to the pluggable transport client (default: lyrebird or obfs4proxy from PATH).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_plugin: Option<PathBuf>,

    /// Process name matched when terminating stale instances.
    #[serde(default = "default_process_name")]
    pub process_name: String,

    /// Local SOCKS listen port.
    #[serde(default = "default_socks_port")]
    pub socks_port: u16,

    /// Local control port.
    #[serde(default = "default_control_port")]
    pub control_port: u16,

    /// Directory for Tor state, torrc and log (default: data_dir/tor).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Maximum time to wait for "Bootstrapped 100%".
    #[serde(default = "default_bootstrap_timeout_secs")]
    pub bootstrap_timeout_secs: u64,

    /// Interval between log polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_process_name() -> String {
    "tor".to_string()
}

fn default_socks_port() -> u16 {
    DEFAULT_SOCKS_PORT
}

fn default_control_port() -> u16 {
    DEFAULT_CONTROL_PORT
}

fn default_bootstrap_timeout_secs() -> u64 {
    DEFAULT_BOOTSTRAP_TIMEOUT_SECS
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            tor_binary: None,
            transport_plugin: None,
            process_name: default_process_name(),
            socks_port: DEFAULT_SOCKS_PORT,
            control_port: DEFAULT_CONTROL_PORT,
            data_dir: None,
            bootstrap_timeout_secs: DEFAULT_BOOTSTRAP_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl TorConfig {
    /// Apply environment variable overrides.
    pub fn with_env_overrides(mut self) -> Self {
        // BRIDGEFETCH_TOR_BINARY - path to tor binary
        if let Ok(path) = env::var("BRIDGEFETCH_TOR_BINARY") {
            if !path.is_empty() {
                self.tor_binary = Some(PathBuf::from(path));
            }
        }

        // BRIDGEFETCH_TRANSPORT_PLUGIN - path to lyrebird/obfs4proxy
        if let Ok(path) = env::var("BRIDGEFETCH_TRANSPORT_PLUGIN") {
            if !path.is_empty() {
                self.transport_plugin = Some(PathBuf::from(path));
            }
        }

        // BRIDGEFETCH_SOCKS_PORT - local SOCKS port
        if let Some(port) = env::var("BRIDGEFETCH_SOCKS_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
        {
            self.socks_port = port;
        }

        self
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Tor working directory, defaulting to `<data_dir>/tor`.
    pub fn resolved_data_dir(&self, data_dir: &Path) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("tor"))
    }

    /// Find the tor binary in PATH or at the configured location.
    pub fn find_tor_binary(&self) -> Option<PathBuf> {
        // Check explicit path first
        if let Some(ref path) = self.tor_binary {
            if path.exists() {
                return Some(path.clone());
            }
        }

        let candidates = if cfg!(windows) {
            vec!["tor.exe", "Tor\\tor.exe"]
        } else {
            vec!["tor", "/usr/bin/tor", "/usr/local/bin/tor"]
        };

        candidates
            .into_iter()
            .find_map(|candidate| which::which(candidate).ok())
    }

    /// Find the pluggable transport client in PATH or at the configured location.
    pub fn find_transport_plugin(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.transport_plugin {
            if path.exists() {
                return Some(path.clone());
            }
        }

        TRANSPORT_PLUGIN_NAMES
            .iter()
            .find_map(|name| which::which(name).ok())
    }
}
