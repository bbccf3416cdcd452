//! Request payload encoding.
//!
//! A [`Payload`] is the caller-supplied value to send as a request body.
//! [`encode`] turns it into an [`EncodedBody`]: the body plus the content
//! type it implies.
//!
//! # Dispatch order
//!
//! | Variant    | Body                          | Content-Type                          |
//! |------------|-------------------------------|---------------------------------------|
//! | `Empty`    | none                          | none                                  |
//! | `Form`     | `k=v&...` (form escaped)      | `application/x-www-form-urlencoded`   |
//! | `Entity`   | entity's own bytes            | entity-declared                       |
//! | `Protobuf` | prost binary encoding         | `application/x-protobuf`              |
//! | `Bytes`    | verbatim                      | sniffed (never empty)                 |
//! | `Text`     | verbatim                      | none                                  |
//! | `Stream`   | the stream, sent once         | none                                  |
//! | `Json`     | `serde_json` output           | `application/json`                    |
//!
//! The `From` conversions decide which variant a Rust value lands in, so a
//! `String` is always text and never falls through to JSON, and a
//! `Vec<u8>` is always sniffed bytes.
//!
//! # Examples
//!
//! ```
//! use courier_http::payload::{encode, Payload};
//! use courier_http::Form;
//!
//! let encoded = encode(Form::new().with("k", "v").into()).unwrap();
//! assert_eq!(encoded.content_type(), Some("application/x-www-form-urlencoded"));
//!
//! let encoded = encode(Payload::json(vec![1, 2, 3])).unwrap();
//! assert_eq!(encoded.content_type(), Some("application/json"));
//! assert_eq!(encoded.body().as_bytes(), Some(&b"[1,2,3]"[..]));
//! ```

mod form;
pub mod sniff;

pub use form::Form;

use crate::error::{BoxError, Error, Result};
use bytes::Bytes;
use serde::Serialize;
use std::fmt;

/// Content type for form bodies.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
/// Content type for JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";
/// Content type for protocol buffer bodies.
pub const APPLICATION_PROTOBUF: &str = "application/x-protobuf";

/// A value that knows how to serialize itself and which content type it has.
pub trait Entity: Send + Sync {
    /// Serialized body bytes.
    fn bytes(&self) -> std::result::Result<Bytes, BoxError>;

    /// Content type of the serialized bytes.
    fn content_type(&self) -> &str;
}

/// An [`Entity`] serialized as JSON.
pub struct JsonEntity<T> {
    value: T,
}

impl<T: Serialize + Send + Sync> JsonEntity<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Serialize + Send + Sync> Entity for JsonEntity<T> {
    fn bytes(&self) -> std::result::Result<Bytes, BoxError> {
        Ok(Bytes::from(serde_json::to_vec(&self.value)?))
    }

    fn content_type(&self) -> &str {
        APPLICATION_JSON
    }
}

/// Object-safe view of a protocol buffer message.
pub trait ProtoMessage: Send + Sync {
    fn encode_message(&self) -> Vec<u8>;
}

impl<M: prost::Message> ProtoMessage for M {
    fn encode_message(&self) -> Vec<u8> {
        self.encode_to_vec()
    }
}

/// Object-safe view of a value serialized through the JSON fallback.
pub trait JsonBody: Send + Sync {
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
}

impl<T: Serialize + Send + Sync> JsonBody for T {
    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Caller-supplied request body.
pub enum Payload {
    Empty,
    Form(Form),
    Entity(Box<dyn Entity>),
    Protobuf(Box<dyn ProtoMessage>),
    Bytes(Bytes),
    Text(String),
    Stream(reqwest::Body),
    Json(Box<dyn JsonBody>),
}

impl Payload {
    /// Wrap a self-describing entity.
    pub fn entity(entity: impl Entity + 'static) -> Self {
        Payload::Entity(Box::new(entity))
    }

    /// Wrap a protocol buffer message.
    pub fn protobuf(message: impl prost::Message + 'static) -> Self {
        Payload::Protobuf(Box::new(message))
    }

    /// Serialize `value` as JSON when encoded.
    pub fn json<T: Serialize + Send + Sync + 'static>(value: T) -> Self {
        Payload::Json(Box::new(value))
    }

    /// Wrap a byte stream. It is read lazily by the transport, exactly once.
    pub fn stream<S>(stream: S) -> Self
    where
        S: futures::TryStream + Send + Sync + 'static,
        S::Error: Into<BoxError>,
        Bytes: From<S::Ok>,
    {
        Payload::Stream(reqwest::Body::wrap_stream(stream))
    }

    /// Short name of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Empty => "empty",
            Payload::Form(_) => "form",
            Payload::Entity(_) => "entity",
            Payload::Protobuf(_) => "protobuf",
            Payload::Bytes(_) => "bytes",
            Payload::Text(_) => "text",
            Payload::Stream(_) => "stream",
            Payload::Json(_) => "json",
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Form(form) => f.debug_tuple("Form").field(form).finish(),
            Payload::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Payload::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Empty
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map_or(Payload::Empty, Into::into)
    }
}

impl From<Form> for Payload {
    fn from(form: Form) -> Self {
        Payload::Form(form)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(bytes: &'static [u8]) -> Self {
        Payload::Bytes(Bytes::from_static(bytes))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<reqwest::Body> for Payload {
    fn from(body: reqwest::Body) -> Self {
        Payload::Stream(body)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(Box::new(value))
    }
}

impl<T: Serialize + Send + Sync + 'static> From<JsonEntity<T>> for Payload {
    fn from(entity: JsonEntity<T>) -> Self {
        Payload::entity(entity)
    }
}

/// Body of an outgoing request.
#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Buffered bytes; can be replayed on every retry.
    Bytes(Bytes),
    /// Single-pass stream; sent at most once.
    Stream(reqwest::Body),
}

impl RequestBody {
    /// Buffered bytes, if the body is not a stream.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RequestBody::Empty => Some(&[]),
            RequestBody::Bytes(bytes) => Some(bytes),
            RequestBody::Stream(_) => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, RequestBody::Stream(_))
    }
}

/// Output of [`encode`].
#[derive(Debug, Default)]
pub struct EncodedBody {
    body: RequestBody,
    content_type: Option<String>,
}

impl EncodedBody {
    fn new(body: RequestBody, content_type: Option<&str>) -> Self {
        Self {
            body,
            content_type: content_type.map(str::to_owned),
        }
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Content type implied by the payload, if it claims one.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn into_parts(self) -> (RequestBody, Option<String>) {
        (self.body, self.content_type)
    }
}

/// Encode a payload into a request body and content type.
///
/// Serialization failures surface as [`Error::Encode`]; nothing else fails.
/// A stream payload is moved into the body untouched.
pub fn encode(payload: Payload) -> Result<EncodedBody> {
    let encoded = match payload {
        Payload::Empty => EncodedBody::default(),
        Payload::Form(form) => EncodedBody::new(
            RequestBody::Bytes(Bytes::from(form.encode())),
            Some(FORM_URLENCODED),
        ),
        Payload::Entity(entity) => {
            let data = entity.bytes().map_err(Error::Encode)?;
            EncodedBody::new(RequestBody::Bytes(data), Some(entity.content_type()))
        }
        Payload::Protobuf(message) => EncodedBody::new(
            RequestBody::Bytes(Bytes::from(message.encode_message())),
            Some(APPLICATION_PROTOBUF),
        ),
        Payload::Bytes(bytes) => {
            let content_type = sniff::detect_content_type(&bytes);
            EncodedBody::new(RequestBody::Bytes(bytes), Some(content_type))
        }
        Payload::Text(text) => EncodedBody::new(RequestBody::Bytes(Bytes::from(text)), None),
        Payload::Stream(stream) => EncodedBody::new(RequestBody::Stream(stream), None),
        Payload::Json(value) => {
            let data = value.to_json().map_err(|e| Error::Encode(Box::new(e)))?;
            EncodedBody::new(RequestBody::Bytes(Bytes::from(data)), Some(APPLICATION_JSON))
        }
    };
    Ok(encoded)
}
