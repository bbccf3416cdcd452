//! Response envelope.
//!
//! [`Response`] bundles the final outcome of a call: the response head and
//! body when one arrived, and the error recorded so far. It is produced once
//! per call by the client and consumed once by the caller.
//!
//! # Lifecycle
//!
//! ```text
//! Client ──► Response ──► check_status(..) ──► unmarshal_body_json / bytes / text
//!                     └──────────────────────► close / drop
//! ```
//!
//! The body is released on every path: a failed status check drains it
//! after capturing a short prefix, decoding reads it to the end, and
//! `close` drops it.
//!
//! # Examples
//!
//! ```ignore
//! let user: User = client
//!     .get(&ctx, "http://localhost/users/1", None, &[])
//!     .await
//!     .check_status(&[200])
//!     .await
//!     .unmarshal_body_json()
//!     .await?;
//! ```

use crate::error::{BoxError, Error, Result, UnexpectedStatusError};
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode, Version};
use serde::de::DeserializeOwned;
use url::Url;

/// Maximum number of body bytes captured by a failed status check.
pub const STATUS_BODY_LIMIT: usize = 4096;

#[derive(Debug)]
struct Head {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    url: Url,
}

impl Head {
    fn of(response: &reqwest::Response) -> Self {
        Self {
            status: response.status(),
            version: response.version(),
            headers: response.headers().clone(),
            url: response.url().clone(),
        }
    }
}

/// Outcome of one logical call.
///
/// Either an error is recorded, or a response head and body are present and
/// the envelope is clean. A failed status check records an error while
/// keeping the head for inspection.
#[derive(Debug)]
pub struct Response {
    head: Option<Head>,
    body: Option<reqwest::Response>,
    error: Option<Error>,
}

impl Default for Response {
    /// An envelope with neither response nor error; reports [`Error::NoResponse`].
    fn default() -> Self {
        Self::from_parts(None, None)
    }
}

impl From<Result<reqwest::Response>> for Response {
    fn from(result: Result<reqwest::Response>) -> Self {
        Self::new(result)
    }
}

impl Response {
    pub fn new(result: Result<reqwest::Response>) -> Self {
        match result {
            Ok(response) => Self::from_parts(Some(response), None),
            Err(err) => Self::from_parts(None, Some(err)),
        }
    }

    /// Envelope for a call that failed before a response existed.
    pub fn failed(error: Error) -> Self {
        Self::from_parts(None, Some(error))
    }

    fn from_parts(response: Option<reqwest::Response>, error: Option<Error>) -> Self {
        let error = match (&response, error) {
            (None, None) => Some(Error::NoResponse),
            (_, error) => error,
        };
        Self {
            head: response.as_ref().map(Head::of),
            body: response,
            error,
        }
    }

    /// The recorded error, or `None` when the envelope is clean.
    pub fn err(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Status of the response, kept even after a failed status check.
    pub fn status(&self) -> Option<StatusCode> {
        self.head.as_ref().map(|head| head.status)
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.head.as_ref().map(|head| &head.headers)
    }

    pub fn version(&self) -> Option<Version> {
        self.head.as_ref().map(|head| head.version)
    }

    /// Final URL of the response, after redirects.
    pub fn url(&self) -> Option<&Url> {
        self.head.as_ref().map(|head| &head.url)
    }

    /// Whether the body is still open.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Release the body without reading it. Idempotent.
    ///
    /// A body dropped before it is fully read cannot return its connection
    /// to the pool; prefer [`Response::discard`] when the connection should
    /// be reused.
    pub fn close(&mut self) {
        self.body.take();
    }

    /// Drain and release the body. Idempotent.
    pub async fn discard(&mut self) {
        if let Some(response) = self.body.take() {
            drain(response).await;
        }
    }

    /// Record an error unless `status` is one of `expected`.
    ///
    /// No-op once an error is recorded. On mismatch the first
    /// [`STATUS_BODY_LIMIT`] bytes of the body are captured into
    /// [`UnexpectedStatusError`], the rest is drained and the body released.
    pub async fn check_status(mut self, expected: &[u16]) -> Self {
        if self.error.is_some() {
            return self;
        }
        let status = match &self.head {
            Some(head) => head.status,
            None => return self,
        };
        if expected.contains(&status.as_u16()) {
            return self;
        }

        let body = match self.body.take() {
            Some(response) => read_prefix_and_drain(response, STATUS_BODY_LIMIT).await,
            None => Bytes::new(),
        };
        self.error = Some(Error::UnexpectedStatus(UnexpectedStatusError {
            code: status.as_u16(),
            status: status.canonical_reason().unwrap_or_default().to_owned(),
            body,
        }));
        self
    }

    /// Decode the body as JSON.
    ///
    /// A recorded error is returned without touching the body. Otherwise the
    /// body is read to the end and released whether or not decoding succeeds.
    pub async fn unmarshal_body_json<T: DeserializeOwned>(self) -> Result<T> {
        let data = self.bytes().await?;
        serde_json::from_slice(&data).map_err(Error::Decode)
    }

    /// Like [`Response::unmarshal_body_json`], then surface the error the
    /// decoded value reports about itself.
    pub async fn unmarshal_body_json_checked<T>(self) -> Result<T>
    where
        T: DeserializeOwned + ErrorCheck,
    {
        let value: T = self.unmarshal_body_json().await?;
        value.check().map_err(Error::Application)?;
        Ok(value)
    }

    /// Read the whole body.
    pub async fn bytes(mut self) -> Result<Bytes> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        match self.body.take() {
            Some(response) => Ok(response.bytes().await?),
            None => Err(Error::NoResponse),
        }
    }

    /// Read the whole body as text, honouring the response charset.
    pub async fn text(mut self) -> Result<String> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        match self.body.take() {
            Some(response) => Ok(response.text().await?),
            None => Err(Error::NoResponse),
        }
    }

    /// Hand back the raw response for streaming, or the recorded error.
    pub fn into_result(mut self) -> Result<reqwest::Response> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.body.take().ok_or(Error::NoResponse)
    }
}

/// Decoded values that can carry an application-level error.
///
/// Implement this for response types whose schema embeds an error inside a
/// successful body, then decode with [`Response::unmarshal_body_json_checked`].
pub trait ErrorCheck {
    fn check(&self) -> std::result::Result<(), BoxError>;
}

/// Read and discard whatever is left of the body.
pub(crate) async fn drain(mut response: reqwest::Response) {
    while let Ok(Some(_)) = response.chunk().await {}
}

/// Keep at most `limit` bytes of the body and drain the rest.
pub(crate) async fn read_prefix_and_drain(mut response: reqwest::Response, limit: usize) -> Bytes {
    let mut prefix = BytesMut::new();
    while let Ok(Some(chunk)) = response.chunk().await {
        let room = limit.saturating_sub(prefix.len());
        prefix.extend_from_slice(&chunk[..room.min(chunk.len())]);
    }
    prefix.freeze()
}
