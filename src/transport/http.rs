use super::{RawResponse, Transport, TransportError};
use crate::request::Request;
use crate::Result;
use async_trait::async_trait;
use reqwest::Proxy;
use std::env;
use std::time::Duration;
use tracing::warn;

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|s| s.trim().parse::<u64>().ok())
}

/// Knobs for the reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub proxy_url: Option<String>,
    pub user_agent: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            proxy_url: None,
            user_agent: None,
        }
    }
}

impl HttpTransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `NETWORK_CLIENT_*` environment variables.
    ///
    /// - `NETWORK_CLIENT_HTTP_TIMEOUT_SECS` (default 30)
    /// - `NETWORK_CLIENT_POOL_MAX_IDLE_PER_HOST` (default 32)
    /// - `NETWORK_CLIENT_POOL_IDLE_TIMEOUT_SECS` (default 90)
    /// - `NETWORK_CLIENT_PROXY_URL`
    /// - `NETWORK_CLIENT_USER_AGENT`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: env_u64("NETWORK_CLIENT_HTTP_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            pool_max_idle_per_host: env_u64("NETWORK_CLIENT_POOL_MAX_IDLE_PER_HOST")
                .map(|n| n as usize)
                .unwrap_or(defaults.pool_max_idle_per_host),
            pool_idle_timeout: env_u64("NETWORK_CLIENT_POOL_IDLE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.pool_idle_timeout),
            proxy_url: env::var("NETWORK_CLIENT_PROXY_URL").ok(),
            user_agent: env::var("NETWORK_CLIENT_USER_AGENT").ok(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_pool_max_idle_per_host(mut self, n: usize) -> Self {
        self.pool_max_idle_per_host = n;
        self
    }

    pub fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn with_config(config: HttpTransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(config.pool_idle_timeout));

        if let Some(proxy_url) = &config.proxy_url {
            match Proxy::all(proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(err) => warn!(proxy = proxy_url.as_str(), error = %err, "ignoring invalid proxy url"),
            }
        }
        if let Some(ua) = &config.user_agent {
            builder = builder.user_agent(ua.clone());
        }

        let client = builder.build().map_err(TransportError::from)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform(&self, request: &Request) -> std::result::Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let resp = builder.send().await?;
        let url = resp.url().clone();
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;

        Ok(RawResponse {
            url,
            status,
            headers,
            body,
        })
    }
}
