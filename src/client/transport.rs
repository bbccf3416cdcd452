//! Transport seam between the executor and the connection pool.

use super::config::ClientConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;

/// Sends one physical request.
///
/// Implemented for [`reqwest::Client`], whose pool is internally
/// synchronized and shared by every call made through a [`Client`](super::Client).
/// Alternative implementations are mostly useful in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        Ok(self.execute(request).await?)
    }
}

/// Build the pooled `reqwest` transport described by `config`.
pub fn pooled_transport(config: &ClientConfig) -> Result<reqwest::Client> {
    let dialer = &config.dialer;
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .connect_timeout(dialer.connect_timeout)
        .tcp_keepalive(dialer.keep_alive)
        .tcp_nodelay(dialer.nodelay)
        .local_address(dialer.local_address)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host);

    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent.as_str());
    }

    if let Some(proxy_url) = &config.proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url.as_str())
            .map_err(|e| Error::Build(format!("invalid proxy {proxy_url:?}: {e}")))?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(Error::Transport)
}
