//! Outgoing request assembly.
//!
//! [`build_request`] merges the query into the URL, attaches the encoded
//! body and its content type, then applies [`RequestOption`]s in order. All
//! failures here happen before any network I/O.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::payload::{EncodedBody, Form, RequestBody};
use http::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, Method};
use std::time::Duration;
use url::Url;

/// Per-request option, applied after the body's content type is set.
///
/// Header options use set semantics: the last option naming a header wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOption {
    /// Set a header, replacing any previous value.
    Header(String, String),
    /// Override the per-attempt timeout for this request.
    Timeout(Duration),
}

impl RequestOption {
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        RequestOption::Header(name.into(), value.into())
    }

    pub fn content_type(mime: impl Into<String>) -> Self {
        RequestOption::Header(CONTENT_TYPE.as_str().to_owned(), mime.into())
    }

    pub fn bearer_auth(token: impl AsRef<str>) -> Self {
        RequestOption::Header(
            AUTHORIZATION.as_str().to_owned(),
            format!("Bearer {}", token.as_ref()),
        )
    }

    pub fn timeout(timeout: Duration) -> Self {
        RequestOption::Timeout(timeout)
    }

    fn apply(&self, request: &mut OutgoingRequest) -> Result<()> {
        match self {
            RequestOption::Header(name, value) => {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| Error::Build(format!("invalid header name {name:?}: {e}")))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| Error::Build(format!("invalid value for header {name}: {e}")))?;
                request.headers.insert(name, value);
            }
            RequestOption::Timeout(timeout) => request.timeout = Some(*timeout),
        }
        Ok(())
    }
}

/// A transport-ready request.
///
/// The executor owns it for the duration of one logical call and produces a
/// fresh `reqwest::Request` per attempt. Buffered bodies are replayed on
/// every attempt; a stream body is handed out once.
#[derive(Debug)]
pub struct OutgoingRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: RequestBody,
    timeout: Option<Duration>,
    stream_sent: bool,
}

impl OutgoingRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            timeout: None,
            stream_sent: false,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether another attempt can be sent with the same body.
    pub(crate) fn can_replay(&self) -> bool {
        !self.stream_sent && !self.body.is_stream()
    }

    /// Build the `reqwest::Request` for the next attempt.
    pub(crate) fn next_attempt(&mut self) -> Result<reqwest::Request> {
        if self.stream_sent {
            return Err(Error::Build("request body stream already consumed".into()));
        }
        let body = match std::mem::take(&mut self.body) {
            RequestBody::Empty => None,
            RequestBody::Bytes(bytes) => {
                self.body = RequestBody::Bytes(bytes.clone());
                Some(reqwest::Body::from(bytes))
            }
            RequestBody::Stream(stream) => {
                self.stream_sent = true;
                Some(stream)
            }
        };

        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        *request.body_mut() = body;
        *request.timeout_mut() = self.timeout;
        Ok(request)
    }
}

impl From<reqwest::Request> for OutgoingRequest {
    fn from(mut request: reqwest::Request) -> Self {
        let body = match request.body_mut().take() {
            None => RequestBody::Empty,
            Some(body) => match body.as_bytes() {
                Some(bytes) => RequestBody::Bytes(bytes::Bytes::copy_from_slice(bytes)),
                None => RequestBody::Stream(body),
            },
        };
        Self {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: std::mem::take(request.headers_mut()),
            body,
            timeout: request.timeout().copied(),
            stream_sent: false,
        }
    }
}

/// Append `query` to `url`, joining with `&` when the URL already has a query.
///
/// # Examples
///
/// ```
/// use courier_http::{request::merge_query, Form};
///
/// let query = Form::new().with("k2", "v2");
/// assert_eq!(merge_query("http://h/echo?k1=v1", Some(&query)), "http://h/echo?k1=v1&k2=v2");
/// assert_eq!(merge_query("http://h/echo", Some(&query)), "http://h/echo?k2=v2");
/// assert_eq!(merge_query("http://h/echo", None), "http://h/echo");
/// ```
pub fn merge_query(url: &str, query: Option<&Form>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(query) => {
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{url}{separator}{}", query.encode())
        }
        None => url.to_owned(),
    }
}

/// Assemble an [`OutgoingRequest`].
///
/// Fails with [`Error::Cancelled`]/[`Error::DeadlineExceeded`] when `ctx` is
/// already done, [`Error::InvalidUrl`] for a malformed URL and
/// [`Error::Build`] for invalid header options.
pub fn build_request(
    ctx: &Context,
    method: Method,
    url: &str,
    query: Option<&Form>,
    body: EncodedBody,
    options: &[RequestOption],
) -> Result<OutgoingRequest> {
    if let Some(err) = ctx.err() {
        return Err(err);
    }

    let url = Url::parse(&merge_query(url, query))?;
    let mut request = OutgoingRequest::new(method, url);

    let (body, content_type) = body.into_parts();
    request.body = body;
    if let Some(content_type) = content_type.filter(|ct| !ct.is_empty()) {
        let value = HeaderValue::from_str(&content_type)
            .map_err(|e| Error::Build(format!("invalid content type {content_type:?}: {e}")))?;
        request.headers.insert(CONTENT_TYPE, value);
    }

    for option in options {
        option.apply(&mut request)?;
    }

    Ok(request)
}
