//! Fetch engine: download every transport listing through the proxy.
//!
//! Each transport class is fetched independently with its own retry budget.
//! A class that keeps failing degrades to an empty list so one broken
//! listing never costs the others. Only when every listing fails is the
//! fetch itself an error.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{extract_bridge_lines, BridgeLine, FetchedBridges, TransportClass};
use crate::config::FetchConfig;
use crate::http_client::HttpClient;

/// Errors from fetching listings.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Every bridge listing failed after {attempts} attempt(s)")]
    AllClassesFailed { attempts: u32 },
}

/// Anything that can produce the bridge listings for one pass.
#[async_trait]
pub trait BridgeSource: Send + Sync {
    /// Fetch every transport class through `proxy_url`, dropping blacklisted
    /// lines. Individual classes degrade to empty; the call fails when no
    /// listing could be fetched at all.
    async fn fetch_all(
        &self,
        proxy_url: &str,
        blacklist: &HashSet<BridgeLine>,
    ) -> Result<FetchedBridges, FetchError>;
}

/// Fetches the public listings over HTTP.
#[derive(Debug, Clone)]
pub struct FetchEngine {
    config: FetchConfig,
}

impl FetchEngine {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    /// Build a client with the listing headers, optionally routed through a proxy.
    pub fn client(&self, proxy_url: Option<&str>) -> Result<HttpClient, FetchError> {
        let mut builder = HttpClient::builder(self.config.timeout()).proxy(proxy_url);
        if let Some(ref ua) = self.config.user_agent {
            builder = builder.user_agent(ua);
        }
        if let Some(ref referer) = self.config.referer {
            builder = builder.referer(referer);
        }
        builder.build().map_err(FetchError::Client)
    }

    /// Fetch all classes with an already configured client.
    pub async fn fetch_with(
        &self,
        client: &HttpClient,
        blacklist: &HashSet<BridgeLine>,
    ) -> Result<FetchedBridges, FetchError> {
        let mut fetched = FetchedBridges::new();
        let mut failed = 0;

        for class in TransportClass::ALL {
            let lines = match self.fetch_class_with_retry(client, class).await {
                Some(lines) => lines,
                None => {
                    failed += 1;
                    Vec::new()
                }
            };
            let before = lines.len();
            let lines: Vec<BridgeLine> = lines
                .into_iter()
                .filter(|line| !blacklist.contains(line))
                .collect();
            if lines.len() < before {
                debug!(
                    "Dropped {} blacklisted {} line(s)",
                    before - lines.len(),
                    class
                );
            }
            info!("Fetched {} {} bridge(s)", lines.len(), class);
            fetched.insert(class, lines);
        }

        if failed == TransportClass::ALL.len() {
            return Err(FetchError::AllClassesFailed {
                attempts: self.config.max_attempts.max(1),
            });
        }
        Ok(fetched)
    }

    /// Single attempt at one listing page.
    pub async fn fetch_class(
        &self,
        client: &HttpClient,
        class: TransportClass,
    ) -> Result<Vec<BridgeLine>, FetchError> {
        let url = self.config.endpoint(class);
        let html = client
            .get_text(&url)
            .await
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;
        Ok(extract_bridge_lines(
            &html,
            class,
            self.config.max_bridges_per_transport,
        ))
    }

    async fn fetch_class_with_retry(
        &self,
        client: &HttpClient,
        class: TransportClass,
    ) -> Option<Vec<BridgeLine>> {
        let attempts = self.config.max_attempts.max(1);

        for attempt in 1..=attempts {
            match self.fetch_class(client, class).await {
                Ok(lines) => return Some(lines),
                Err(e) => {
                    warn!(
                        "Fetching {} failed (attempt {}/{}): {}",
                        class, attempt, attempts, e
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                }
            }
        }

        warn!("Giving up on {} after {} attempts", class, attempts);
        None
    }
}

#[async_trait]
impl BridgeSource for FetchEngine {
    async fn fetch_all(
        &self,
        proxy_url: &str,
        blacklist: &HashSet<BridgeLine>,
    ) -> Result<FetchedBridges, FetchError> {
        let client = self.client(Some(proxy_url))?;
        self.fetch_with(&client, blacklist).await
    }
}
