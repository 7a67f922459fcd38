//! Fetch engine configuration: timeouts, retry policy and listing endpoints.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bridges::TransportClass;

/// Default per-request timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;

/// Default attempts per transport before giving up on it.
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

/// Default delay between attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 10;

/// Default cap on lines taken from one listing page.
pub const DEFAULT_MAX_BRIDGES_PER_TRANSPORT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per transport (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts in seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Maximum lines taken from one listing page.
    #[serde(default = "default_max_bridges")]
    pub max_bridges_per_transport: usize,

    /// User agent ("impersonate" for a random browser, default Firefox).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Referer header (default: https://bridges.torproject.org).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,

    /// Listing URL overrides keyed by transport name (obfs4, obfs4_ipv6, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub endpoints: HashMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_FETCH_ATTEMPTS
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

fn default_max_bridges() -> usize {
    DEFAULT_MAX_BRIDGES_PER_TRANSPORT
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_attempts: DEFAULT_FETCH_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            max_bridges_per_transport: DEFAULT_MAX_BRIDGES_PER_TRANSPORT,
            user_agent: None,
            referer: None,
            endpoints: HashMap::new(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Listing URL for a transport class, honoring overrides.
    pub fn endpoint(&self, class: TransportClass) -> String {
        self.endpoints
            .iter()
            .find(|(name, _)| name.parse::<TransportClass>().ok() == Some(class))
            .map(|(_, url)| url.clone())
            .unwrap_or_else(|| class.default_url().to_string())
    }

    /// Validate the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("fetch.max_attempts must be at least 1".to_string());
        }
        for (name, url) in &self.endpoints {
            name.parse::<TransportClass>()?;
            url::Url::parse(url)
                .map_err(|e| format!("invalid endpoint for {}: {} ({})", name, url, e))?;
        }
        Ok(())
    }
}
