//! # Courier-HTTP: an HTTP client core
//!
//! This crate wraps a pooled HTTP transport with the pieces most service
//! clients end up writing by hand: turning a value into a request body,
//! retrying transient failures, and handling responses so connections go
//! back to the pool.
//!
//! ## Overview
//!
//! A call flows through four stages:
//!
//! 1. **Encode** - a [`Payload`] becomes bytes or a stream plus a content type
//! 2. **Build** - method, URL, query and [`RequestOption`]s become a request
//! 3. **Execute** - the [`Client`] sends it, retrying per its policies
//! 4. **Inspect** - the [`Response`] envelope checks status and decodes JSON
//!
//! Every stage may fail; failures travel inside the [`Response`] so calls
//! chain without intermediate error handling.
//!
//! ## Key Features
//!
//! - **Payload dispatch**: forms, JSON, protobuf, raw bytes, text and streams
//! - **Content sniffing**: raw bytes get a content type from their leading bytes
//! - **Retry engine**: pluggable policy, backoff and exhaustion handling
//! - **Cancellation**: a [`Context`] deadline or cancel aborts in-flight work
//! - **Pool friendliness**: unread bodies are drained before connections are reused
//!
//! ## Client Usage
//!
//! ```ignore
//! use courier_http::{Client, Context, Form};
//! use std::time::Duration;
//!
//! #[derive(serde::Deserialize)]
//! struct Echo {
//!     a: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new();
//!     let ctx = Context::background().with_timeout(Duration::from_secs(5));
//!
//!     // POST JSON and decode the answer
//!     let echo: Echo = client
//!         .post(&ctx, "http://localhost:8080/echo", serde_json::json!({"a": "b"}), &[])
//!         .await
//!         .check_status(&[200])
//!         .await
//!         .unmarshal_body_json()
//!         .await?;
//!     assert_eq!(echo.a, "b");
//!
//!     // Submit a form
//!     let form = Form::new().with("k", "v");
//!     let body = client
//!         .post_form(&ctx, "http://localhost:8080/echo", form, &[])
//!         .await
//!         .text()
//!         .await?;
//!     assert_eq!(body, "k=v");
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[payload]** - Payload variants, form encoding and content sniffing
//! - **[request]** - Request options and request construction
//! - **[response]** - The response envelope
//! - **[client]** - Client, retry engine and transport
//! - **[context]** - Deadlines and cancellation
//! - **[error]** - Error types and result handling

pub mod client;
pub mod context;
pub mod error;
pub mod payload;
pub mod request;
pub mod response;

pub use client::{Client, ClientBuilder, ClientConfig};
pub use context::Context;
pub use error::{Error, Result, UnexpectedStatusError};
pub use payload::{Form, JsonEntity, Payload};
pub use request::RequestOption;
pub use response::{ErrorCheck, Response};
