//! Client configuration.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Client configuration
///
/// Retry limits bound the executor: at most `retry_max + 1` attempts, with
/// waits clamped to `retry_wait_min..=retry_wait_max` by the default backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-attempt HTTP timeout
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum number of retries after the first attempt
    #[serde(default = "default_retry_max")]
    pub retry_max: u32,

    /// Minimum wait between attempts
    #[serde(default = "default_retry_wait_min")]
    pub retry_wait_min: Duration,

    /// Maximum wait between attempts
    #[serde(default = "default_retry_wait_max")]
    pub retry_wait_max: Duration,

    /// How long an idle pooled connection is kept
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections kept per host
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,

    /// Custom user agent
    #[serde(default)]
    pub user_agent: Option<String>,

    /// HTTP/HTTPS proxy URL
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Emit `tracing` events for attempts and retries
    #[serde(default)]
    pub enable_logging: bool,

    /// Connection dialing settings
    #[serde(default)]
    pub dialer: Dialer,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retry_max: default_retry_max(),
            retry_wait_min: default_retry_wait_min(),
            retry_wait_max: default_retry_wait_max(),
            pool_idle_timeout: default_pool_idle_timeout(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            user_agent: None,
            proxy_url: None,
            enable_logging: false,
            dialer: Dialer::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry count and the wait bounds
    pub fn with_retry_limit(
        mut self,
        retry_max: u32,
        wait_min: Duration,
        wait_max: Duration,
    ) -> Self {
        self.retry_max = retry_max;
        self.retry_wait_min = wait_min;
        self.retry_wait_max = wait_max;
        self
    }

    pub fn with_dialer(mut self, dialer: Dialer) -> Self {
        self.dialer = dialer;
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }
}

/// How new connections are dialed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialer {
    /// Timeout for establishing a connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// TCP keepalive interval; `None` disables keepalive
    #[serde(default = "default_keep_alive")]
    pub keep_alive: Option<Duration>,

    /// Set `TCP_NODELAY`
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,

    /// Local address to bind outgoing connections to
    #[serde(default)]
    pub local_address: Option<IpAddr>,
}

impl Default for Dialer {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            keep_alive: default_keep_alive(),
            nodelay: default_nodelay(),
            local_address: None,
        }
    }
}

// Default value functions for serde
fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_retry_max() -> u32 {
    5
}

fn default_retry_wait_min() -> Duration {
    Duration::from_millis(100)
}

fn default_retry_wait_max() -> Duration {
    Duration::from_secs(10)
}

fn default_pool_idle_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_pool_max_idle_per_host() -> usize {
    100
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_keep_alive() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

fn default_nodelay() -> bool {
    true
}
