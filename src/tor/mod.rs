//! Local Tor proxy supervision.
//!
//! A run needs a working SOCKS proxy before it can reach the bridge
//! distributor. The [`Supervisor`] owns that proxy: it starts a Tor client
//! bound to one entry bridge, waits for bootstrap, and tears it down again.
//! Process control lives behind [`TorLauncher`] so the timing logic can be
//! exercised without a real daemon.

mod launcher;
mod supervisor;

pub use launcher::{generate_torrc, CTorHandle, CTorLauncher, Readiness, TorLauncher, TorrcSpec};
pub use supervisor::{ProxySession, Supervisor, SupervisorSettings};

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Marker Tor writes to its log once the circuit is usable.
pub const BOOTSTRAP_MARKER: &str = "Bootstrapped 100%";

/// Errors from acquiring the local proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The entry bridge did not bootstrap within the wait budget.
    #[error("Tor did not bootstrap within {} seconds", .waited.as_secs())]
    BootstrapTimeout { waited: Duration },
    /// The daemon exited before it finished bootstrapping.
    #[error("Tor exited before bootstrapping ({status})")]
    Exited { status: String },
    /// The daemon could not be started at all.
    #[error("Failed to launch Tor: {0}")]
    Launch(String),
    /// Missing binaries or unusable paths.
    #[error("Tor configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    /// Whether the failure should be charged to the entry bridge.
    pub fn is_candidate_failure(&self) -> bool {
        matches!(
            self,
            ProxyError::BootstrapTimeout { .. } | ProxyError::Exited { .. }
        )
    }
}

/// Lifecycle state of the supervised proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Idle,
    Bootstrapping,
    Ready,
    Failed,
}

impl fmt::Display for ProxyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProxyState::Idle => "idle",
            ProxyState::Bootstrapping => "bootstrapping",
            ProxyState::Ready => "ready",
            ProxyState::Failed => "failed",
        };
        f.write_str(s)
    }
}
