//! HTTP client construction
//!
//! Every operation receives an explicitly built [`reqwest::Client`]; there is
//! no process-wide session. Clients can route through a SOCKS5h proxy (Tor)
//! or any HTTP proxy.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default Tor SOCKS port
pub const DEFAULT_TOR_PORT: u16 = 9050;

/// Endpoint reporting whether a request arrived through Tor
pub const TOR_CHECK_URL: &str = "https://check.torproject.org/api/ip";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Proxy URL (e.g. socks5h://127.0.0.1:9050 or http://127.0.0.1:8080)
    pub proxy: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Fixed user agent; a random desktop agent is picked when unset
    pub user_agent: Option<String>,
    /// Headers sent with every request
    pub headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout_secs: 15,
            user_agent: None,
            headers: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Route everything through a local Tor SOCKS port
    pub fn tor(port: u16) -> Self {
        Self {
            proxy: Some(tor_proxy_url(port)),
            ..Self::default()
        }
    }

    pub fn with_proxy(mut self, proxy: &str) -> Self {
        self.proxy = Some(proxy.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Errors from HTTP operations
#[derive(Debug, Error)]
pub enum NetError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid header {0}")]
    InvalidHeader(String),

    #[error("Expected a JSON response: {0}")]
    InvalidJson(String),
}

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:131.0) Gecko/20100101 Firefox/131.0",
    "Mozilla/5.0 (Linux; Android 14; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Mobile Safari/537.36",
];

/// Get a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// SOCKS5h URL for a local Tor port (DNS resolved through Tor)
pub fn tor_proxy_url(port: u16) -> String {
    format!("socks5h://127.0.0.1:{}", port)
}

/// Convert name/value pairs into a header map
pub fn header_map<'a, I>(headers: I) -> Result<HeaderMap, NetError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| NetError::InvalidHeader(name.to_string()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeader(name.to_string()))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Create an HTTP client that follows redirects
pub fn build_client(config: &ClientConfig) -> Result<Client, NetError> {
    let headers = header_map(
        config
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    )?;
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| random_user_agent().to_string());

    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(user_agent)
        .default_headers(headers);

    if let Some(proxy_url) = &config.proxy {
        let proxy = Proxy::all(proxy_url).map_err(|e| NetError::ClientBuild(e.to_string()))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| NetError::ClientBuild(e.to_string()))
}

/// Retry policy for transient failures on a single request
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff is `factor * 2^(retry - 1)` seconds
    pub backoff_factor: f64,
    /// Statuses worth retrying
    pub statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_factor: 1.5,
            statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16) as i32;
        Duration::from_secs_f64((self.backoff_factor * 2f64.powi(exp)).max(0.0))
    }

    /// Send a request, rebuilding it for each retry
    pub async fn send<F>(&self, make: F) -> Result<Response, NetError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retry = 0;
        loop {
            match make().send().await {
                Ok(resp)
                    if retry < self.max_retries
                        && self.statuses.contains(&resp.status().as_u16()) =>
                {
                    retry += 1;
                    debug!(
                        "Status {} from {}, retry {}/{}",
                        resp.status(),
                        resp.url(),
                        retry,
                        self.max_retries
                    );
                }
                Ok(resp) => return Ok(resp),
                Err(e) if retry < self.max_retries => {
                    retry += 1;
                    debug!("Request error ({}), retry {}/{}", e, retry, self.max_retries);
                }
                Err(e) => return Err(e.into()),
            }
            tokio::time::sleep(self.backoff(retry)).await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct TorCheck {
    #[serde(rename = "IsTor")]
    is_tor: bool,
}

/// Check whether requests from this client exit through Tor
pub async fn check_tor_connection(client: &Client) -> Result<bool, NetError> {
    check_tor_at(client, TOR_CHECK_URL).await
}

/// Same as [`check_tor_connection`] against a specific endpoint
pub async fn check_tor_at(client: &Client, url: &str) -> Result<bool, NetError> {
    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        return Ok(false);
    }
    let check: TorCheck = resp.json().await?;
    Ok(check.is_tor)
}
