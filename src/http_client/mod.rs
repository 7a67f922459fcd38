//! HTTP client for fetching bridge listings.
//!
//! Privacy features:
//! - Routes every request through the supervised Tor SOCKS port when a proxy
//!   is configured (`socks5h://` so DNS resolution happens inside Tor)
//! - Sends a browser-like header set so the distributor serves its normal page

mod user_agent;

pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::{Client, Proxy};

/// Referer sent with listing requests.
pub const DEFAULT_REFERER: &str = "https://bridges.torproject.org";

/// Thin wrapper around `reqwest::Client` with the proxy and headers baked in.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    proxy_url: Option<String>,
}

/// Builder for constructing `HttpClient` with optional configuration.
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    referer: Option<String>,
    proxy_url: Option<String>,
}

impl HttpClientBuilder {
    /// Set the user agent string.
    /// - `"impersonate"`: Use random real browser user agent
    /// - Any other string: Use as-is
    /// - Not called: Use the default Firefox user agent
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = Some(ua.to_string());
        self
    }

    /// Set the Referer header for requests.
    pub fn referer(mut self, referer: &str) -> Self {
        self.referer = Some(referer.to_string());
        self
    }

    /// Route all requests through this proxy URL (e.g. `socks5h://127.0.0.1:9050`).
    /// Without this, requests are made directly.
    pub fn proxy(mut self, proxy_url: Option<&str>) -> Self {
        self.proxy_url = proxy_url.map(str::to_string);
        self
    }

    /// Build the `HttpClient`.
    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let user_agent = resolve_user_agent(self.user_agent.as_deref());

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        let referer = self.referer.as_deref().unwrap_or(DEFAULT_REFERER);
        if let Ok(value) = HeaderValue::from_str(referer) {
            headers.insert(REFERER, value);
        }

        let mut builder = Client::builder()
            .user_agent(&user_agent)
            .default_headers(headers)
            .timeout(self.timeout)
            .gzip(true)
            .brotli(true);

        if let Some(ref proxy_url) = self.proxy_url {
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }

        Ok(HttpClient {
            client: builder.build()?,
            proxy_url: self.proxy_url,
        })
    }
}

impl HttpClient {
    /// Start building a client with the given request timeout.
    pub fn builder(timeout: Duration) -> HttpClientBuilder {
        HttpClientBuilder {
            timeout,
            user_agent: None,
            referer: None,
            proxy_url: None,
        }
    }

    /// Proxy this client routes through, if any.
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    /// GET a page and return its body. Non-success statuses are errors.
    pub async fn get_text(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        response.text().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_direct_client() {
        let client = HttpClient::builder(Duration::from_secs(5)).build().unwrap();
        assert!(client.proxy_url().is_none());
    }

    #[test]
    fn test_build_socks_client() {
        let client = HttpClient::builder(Duration::from_secs(5))
            .proxy(Some("socks5h://127.0.0.1:9050"))
            .user_agent("impersonate")
            .build()
            .unwrap();
        assert_eq!(client.proxy_url(), Some("socks5h://127.0.0.1:9050"));
    }
}
