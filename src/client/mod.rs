//! HTTP client and retry engine.
//!
//! This module turns a method, URL, query and [`Payload`](crate::Payload)
//! into one logical call that may span several physical attempts:
//!
//! - **Encode** the payload and infer its content type
//! - **Send** through a pluggable [`Transport`]
//! - **Retry** on transport errors, 429 and 5xx with exponential backoff
//! - **Cancel** as soon as the caller's [`Context`](crate::Context) finishes
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── fetch     - Client, ClientBuilder and the retry loop
//! ├── retry     - RetryPolicy, Backoff and ErrorHandler with defaults
//! ├── transport - Transport trait and the pooled reqwest transport
//! ├── config    - Client configuration
//! └── utils     - Status classification and backoff arithmetic
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Main HTTP client |
//! | [`ClientBuilder`] | Assembles a client from config and policies |
//! | [`ClientConfig`] | Timeouts, retry bounds, pool and dialer settings |
//! | [`RetryPolicy`] | Decides whether an outcome is retried |
//! | [`Backoff`] | Decides how long to wait between attempts |
//! | [`ErrorHandler`] | Maps the last outcome once retries run out |
//!
//! # Examples
//!
//! ## Creating a Client
//!
//! ```
//! use courier_http::client::{Client, ClientConfig};
//! use std::time::Duration;
//!
//! // Default configuration
//! let client = Client::new();
//! assert_eq!(client.config().retry_max, 5);
//!
//! // Custom configuration
//! let config = ClientConfig {
//!     retry_max: 2,
//!     timeout: Duration::from_secs(5),
//!     ..Default::default()
//! };
//! let client = Client::with_config(config).unwrap();
//! assert_eq!(client.config().retry_max, 2);
//! ```
//!
//! ## Utility Functions
//!
//! ```
//! use courier_http::client::{exponential_backoff, is_retryable_status};
//! use std::time::Duration;
//!
//! assert!(is_retryable_status(503));
//! assert!(!is_retryable_status(501));
//! assert!(!is_retryable_status(404));
//!
//! let delay = exponential_backoff(2, Duration::from_millis(100), Duration::from_secs(10));
//! assert_eq!(delay, Duration::from_millis(400));
//! ```

mod config;
mod fetch;
mod retry;
mod transport;
mod utils;

pub use config::{ClientConfig, Dialer};
pub use fetch::{Client, ClientBuilder};
pub use retry::{
    Backoff, ConstantBackoff, DefaultRetryPolicy, ErrorHandler, ExponentialBackoff,
    GiveUpErrorHandler, Outcome, PassthroughErrorHandler, RetryPolicy,
};
pub use transport::{pooled_transport, Transport};
pub use utils::*;
