//! Main HTTP client implementation.
//!
//! Provides [`Client`], which encodes payloads, builds requests and drives
//! them through the retry engine, returning one [`Response`] envelope per
//! logical call.
//!
//! # Examples
//!
//! ## Simple GET request
//!
//! ```ignore
//! use courier_http::{Client, Context, Form};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new();
//!     let ctx = Context::background();
//!     let query = Form::new().with("q", "rust");
//!
//!     let response = client
//!         .get(&ctx, "http://example.com/search", Some(&query), &[])
//!         .await
//!         .check_status(&[200])
//!         .await;
//!     println!("Status: {:?}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## POST with custom retry settings
//!
//! ```ignore
//! use courier_http::{Client, Context, RequestOption};
//! use std::time::Duration;
//!
//! let client = Client::builder()
//!     .retry_limit(3, Duration::from_millis(50), Duration::from_secs(2))
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let ctx = Context::background().with_timeout(Duration::from_secs(30));
//! let created: serde_json::Value = client
//!     .post(&ctx, "http://example.com/items", serde_json::json!({"name": "x"}), &[
//!         RequestOption::bearer_auth("token"),
//!     ])
//!     .await
//!     .check_status(&[201])
//!     .await
//!     .unmarshal_body_json()
//!     .await?;
//! ```

use super::config::{ClientConfig, Dialer};
use super::retry::{
    Backoff, DefaultRetryPolicy, ErrorHandler, ExponentialBackoff, Outcome,
    PassthroughErrorHandler, RetryPolicy,
};
use super::transport::{pooled_transport, Transport};
use crate::context::Context;
use crate::error::Result;
use crate::payload::{encode, Form, Payload};
use crate::request::{build_request, OutgoingRequest, RequestOption};
use crate::response::{drain, Response};
use http::{Method, StatusCode};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The main HTTP client
///
/// Cheap to clone; clones share the connection pool and policies.
///
/// # Features
///
/// - Payload encoding with content-type inference
/// - Automatic retry with pluggable policy, backoff and exhaustion handling
/// - Cancellation through [`Context`]
/// - Pool-friendly response handling through [`Response`]
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff: Arc<dyn Backoff>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl Client {
    /// Create a new client with default configuration
    pub fn new() -> Self {
        let builder = ClientBuilder::new();
        let transport = match pooled_transport(&builder.config) {
            Ok(transport) => transport,
            Err(e) => {
                warn!("Failed to build pooled transport, using reqwest defaults: {}", e);
                reqwest::Client::default()
            }
        };
        builder.assemble(Arc::new(transport))
    }

    /// Start configuring a client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client from a configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        ClientBuilder::new().config(config).build()
    }

    /// Process-wide default client, built on first use.
    ///
    /// Convenience for callers without their own client; nothing in this
    /// crate uses it.
    pub fn shared() -> &'static Client {
        static SHARED: OnceLock<Client> = OnceLock::new();
        SHARED.get_or_init(Client::new)
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Make a GET request, appending `query` to the URL
    pub async fn get(
        &self,
        ctx: &Context,
        url: &str,
        query: Option<&Form>,
        options: &[RequestOption],
    ) -> Response {
        self.request(ctx, Method::GET, url, query, Payload::Empty, options)
            .await
    }

    /// Make a POST request with an encoded payload
    pub async fn post(
        &self,
        ctx: &Context,
        url: &str,
        payload: impl Into<Payload>,
        options: &[RequestOption],
    ) -> Response {
        self.request(ctx, Method::POST, url, None, payload, options)
            .await
    }

    /// POST a form as `application/x-www-form-urlencoded`
    pub async fn post_form(
        &self,
        ctx: &Context,
        url: &str,
        form: Form,
        options: &[RequestOption],
    ) -> Response {
        self.post(ctx, url, Payload::Form(form), options).await
    }

    /// Make a PUT request with an encoded payload
    pub async fn put(
        &self,
        ctx: &Context,
        url: &str,
        payload: impl Into<Payload>,
        options: &[RequestOption],
    ) -> Response {
        self.request(ctx, Method::PUT, url, None, payload, options)
            .await
    }

    /// Make a DELETE request
    pub async fn delete(&self, ctx: &Context, url: &str, options: &[RequestOption]) -> Response {
        self.request(ctx, Method::DELETE, url, None, Payload::Empty, options)
            .await
    }

    /// Make a HEAD request
    pub async fn head(&self, ctx: &Context, url: &str, options: &[RequestOption]) -> Response {
        self.request(ctx, Method::HEAD, url, None, Payload::Empty, options)
            .await
    }

    /// Encode, build and execute a request.
    ///
    /// Encoding and build failures are returned in the envelope without any
    /// network I/O.
    pub async fn request(
        &self,
        ctx: &Context,
        method: Method,
        url: &str,
        query: Option<&Form>,
        payload: impl Into<Payload>,
        options: &[RequestOption],
    ) -> Response {
        let payload = payload.into();
        if self.config.enable_logging {
            debug!(%method, url, payload = payload.kind(), "building request");
        }

        let request = encode(payload)
            .and_then(|body| build_request(ctx, method, url, query, body, options));
        match request {
            Ok(request) => Response::new(self.send(ctx, request).await),
            Err(err) => Response::failed(err),
        }
    }

    /// Execute a prepared request through the retry engine.
    ///
    /// Pass-through counterpart of [`reqwest::Client::execute`]: the raw
    /// response is returned whatever its status.
    pub async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        self.send(&Context::background(), OutgoingRequest::from(request))
            .await
    }

    /// Like [`Client::execute`], wrapped in a [`Response`] envelope.
    pub async fn call(&self, request: reqwest::Request) -> Response {
        Response::new(self.execute(request).await)
    }

    /// HEAD `url` and report whether it answered 200.
    pub async fn check_head_ok(&self, ctx: &Context, url: &str) -> bool {
        let response = self.head(ctx, url, &[]).await;
        let ok = response.status() == Some(StatusCode::OK);
        ok && response.bytes().await.is_ok()
    }

    /// Retry loop.
    ///
    /// At most `retry_max + 1` attempts, strictly sequential. A response
    /// that will be retried is drained before the wait so its connection can
    /// be reused. The context is raced against every suspension point and
    /// its error is terminal.
    async fn send(&self, ctx: &Context, mut request: OutgoingRequest) -> Outcome {
        let config = &self.config;
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            let outgoing = request.next_attempt()?;
            if config.enable_logging {
                debug!(
                    method = %request.method(),
                    url = %request.url(),
                    attempt = attempt + 1,
                    "sending request"
                );
            }

            let outcome = ctx.run(self.transport.send(outgoing)).await?;
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            let retry = match self.retry_policy.should_retry(&outcome, attempt) {
                Ok(retry) => retry,
                Err(err) => {
                    if let Ok(response) = outcome {
                        let _ = ctx.run(drain(response)).await;
                    }
                    return Err(err);
                }
            };
            if !retry {
                return outcome;
            }

            if attempt >= config.retry_max || !request.can_replay() {
                if config.enable_logging {
                    warn!(
                        url = %request.url(),
                        attempts = attempt + 1,
                        elapsed = ?started.elapsed(),
                        replayable = request.can_replay(),
                        "giving up on retries"
                    );
                }
                return ctx
                    .run(self.error_handler.on_exhausted(outcome, attempt + 1))
                    .await?;
            }

            let wait = self
                .backoff
                .wait(attempt, config.retry_wait_min, config.retry_wait_max, &outcome);
            if config.enable_logging {
                match &outcome {
                    Ok(response) => warn!(
                        "Request returned {} (attempt {}), retrying after {:?}",
                        response.status(),
                        attempt + 1,
                        wait
                    ),
                    Err(e) => warn!(
                        "Request failed (attempt {}), retrying after {:?}: {}",
                        attempt + 1,
                        wait,
                        e
                    ),
                }
            }

            if let Ok(response) = outcome {
                ctx.run(drain(response)).await?;
            }
            ctx.run(tokio::time::sleep(wait)).await?;
            attempt += 1;
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Client`].
///
/// Policies default to [`DefaultRetryPolicy`], [`ExponentialBackoff`] and
/// [`PassthroughErrorHandler`]; the transport defaults to a pooled
/// `reqwest::Client` built from the configuration.
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff: Arc<dyn Backoff>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            transport: None,
            retry_policy: Arc::new(DefaultRetryPolicy),
            backoff: Arc::new(ExponentialBackoff),
            error_handler: Arc::new(PassthroughErrorHandler),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Per-attempt HTTP timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Retry count and wait bounds
    pub fn retry_limit(mut self, retry_max: u32, wait_min: Duration, wait_max: Duration) -> Self {
        self.config = self.config.with_retry_limit(retry_max, wait_min, wait_max);
        self
    }

    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }

    pub fn backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Connection dialing settings for the default transport
    pub fn dialer(mut self, dialer: Dialer) -> Self {
        self.config.dialer = dialer;
        self
    }

    /// Emit `tracing` events for attempts and retries
    pub fn logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Use `transport` instead of a pooled `reqwest::Client`.
    ///
    /// Timeout, dialer, proxy and pool settings only apply to the default
    /// transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn build(mut self) -> Result<Client> {
        let transport = match self.transport.take() {
            Some(transport) => transport,
            None => Arc::new(pooled_transport(&self.config)?),
        };
        Ok(self.assemble(transport))
    }

    fn assemble(self, transport: Arc<dyn Transport>) -> Client {
        Client {
            transport,
            config: Arc::new(self.config),
            retry_policy: self.retry_policy,
            backoff: self.backoff,
            error_handler: self.error_handler,
        }
    }
}
