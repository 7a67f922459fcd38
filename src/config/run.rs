//! Entry bridge selection and run loop policy.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bridges::BridgeLine;

/// Failures after which an entry bridge is blacklisted.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 2;

/// Entry bridges tried per cycle before the run gives up.
pub const DEFAULT_MAX_CANDIDATE_ATTEMPTS: u32 = 3;

/// Built-in obfs4 bridges shipped with Tor Browser, used when the pool is empty.
pub const DEFAULT_BRIDGES: &[&str] = &[
    "obfs4 192.95.36.142:443 CDF2E852BF539B82BD10E27E9115A31734E378C2 cert=qUVQ0srL1JI/vO6V6m/24anYXiJD3QP2HgzUKQtQ7GRqqUvs7P+tG43RtAqdhLOALP7DJQ iat-mode=1",
    "obfs4 37.218.245.14:38224 D9A82D2F9C2F65A18407B1D2B764F130847F8B5D cert=bjRaMrr1BRiAW8IE9U5z27fQaYgOhX1UCmOpg2pFpoMvo6ZgQMzLsaTzzQNTlm7hNcb+Sg iat-mode=0",
];

/// Entry bridge selection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Bootstrap failures before a bridge is blacklisted.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Entry bridges tried per cycle before giving up.
    #[serde(default = "default_max_candidate_attempts")]
    pub max_candidate_attempts: u32,

    /// Fallback entry bridges used when the persisted pool is exhausted.
    #[serde(default = "default_bridges")]
    pub default_bridges: Vec<String>,
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_max_candidate_attempts() -> u32 {
    DEFAULT_MAX_CANDIDATE_ATTEMPTS
}

fn default_bridges() -> Vec<String> {
    DEFAULT_BRIDGES.iter().map(|s| s.to_string()).collect()
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            max_candidate_attempts: DEFAULT_MAX_CANDIDATE_ATTEMPTS,
            default_bridges: default_bridges(),
        }
    }
}

impl SelectionConfig {
    /// Default bridges as parsed lines (blank entries dropped).
    pub fn default_bridge_lines(&self) -> Vec<BridgeLine> {
        self.default_bridges
            .iter()
            .filter_map(BridgeLine::new)
            .collect()
    }
}

/// Run loop policy and outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Keep cycling until at least this many new bridges were found.
    #[serde(default = "default_min_new_bridges")]
    pub min_new_bridges: usize,

    /// Upper bound on acquire/fetch/reconcile cycles per run.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,

    /// Delay between cycles in seconds.
    #[serde(default = "default_cycle_delay_secs")]
    pub cycle_delay_secs: u64,

    /// Build a QR code archive of new bridges and attach it to the report.
    #[serde(default = "default_true")]
    pub archive: bool,

    /// Write the first `export_count` fetched obfs4 lines to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_path: Option<PathBuf>,

    /// Number of obfs4 lines written to `export_path`.
    #[serde(default = "default_export_count")]
    pub export_count: usize,
}

fn default_min_new_bridges() -> usize {
    1
}

fn default_max_cycles() -> u32 {
    1
}

fn default_cycle_delay_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_export_count() -> usize {
    2
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            min_new_bridges: default_min_new_bridges(),
            max_cycles: default_max_cycles(),
            cycle_delay_secs: default_cycle_delay_secs(),
            archive: true,
            export_path: None,
            export_count: default_export_count(),
        }
    }
}

impl RunConfig {
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_secs(self.cycle_delay_secs)
    }
}
