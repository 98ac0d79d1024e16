//! Wire envelopes.
//!
//! Client -> server:
//!
//! ```text
//! { id: u64, data: { <Method>: <params> } }
//! ```
//!
//! Server -> client, externally tagged:
//!
//! ```text
//! { Response:   { requestId, data: { <Method>: <result> }, stream?: { id, dataType } } }
//! { Error:      { requestId, message } }
//! { StreamData: { id, seq, payload: { <DataType>: <value> } } }
//! { StreamEnd:  { id, errorCode?, errorMessage? } }
//! ```
//!
//! The dispatch loop first decodes a frame as [`ServerHeader`], which keeps
//! correlation keys and tags but skips every payload. Typed consumers then
//! decode the same bytes as [`ServerMessage<T>`] for the value they expect.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::MsgPackCodec;
use crate::error::Result;

/// Message used when an `Error` envelope carries no text.
pub const DEFAULT_SERVER_ERROR: &str = "Server error";

/// A single-key map `{ <tag>: <value> }`.
///
/// Used for the method-keyed `data` of requests and responses and for the
/// data-type keyed `payload` of stream updates. On decode, entries after the
/// first are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<T> {
    /// Map key (method name or data-type tag).
    pub tag: String,
    /// Value under the key.
    pub value: T,
}

impl<T> Tagged<T> {
    /// Create a tagged value.
    pub fn new(tag: impl Into<String>, value: T) -> Self {
        Self {
            tag: tag.into(),
            value,
        }
    }
}

impl<T: Serialize> Serialize for Tagged<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.tag, &self.value)?;
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Tagged<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TaggedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for TaggedVisitor<T> {
            type Value = Tagged<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map with a single tag key")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Tagged<T>, A::Error> {
                let tag: String = map
                    .next_key()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let value = map.next_value()?;
                while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
                Ok(Tagged { tag, value })
            }
        }

        deserializer.deserialize_map(TaggedVisitor(PhantomData))
    }
}

/// Outbound request envelope.
#[derive(Debug, Serialize)]
pub struct ClientRequest<P> {
    /// Correlation id, unique within the session.
    pub id: u64,
    /// `{ <Method>: <params> }`.
    pub data: Tagged<P>,
}

impl<P: Serialize> ClientRequest<P> {
    /// Build a request envelope for `method`.
    pub fn new(id: u64, method: &str, params: P) -> Self {
        Self {
            id,
            data: Tagged::new(method, params),
        }
    }
}

/// Stream metadata attached to a stream-opening response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    /// Server-assigned stream id.
    pub id: u64,
    /// Tag under which every `StreamData` payload of this stream is keyed.
    pub data_type: String,
}

/// Body of a `Response` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody<T> {
    /// Id of the request being answered.
    pub request_id: u64,
    /// `{ <Method>: <result> }`.
    pub data: Tagged<T>,
    /// Present only on stream-opening responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamInfo>,
}

/// Body of an `Error` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub request_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Server message, or [`DEFAULT_SERVER_ERROR`] when absent or empty.
    pub fn message_or_default(&self) -> String {
        match self.message.as_deref() {
            Some(msg) if !msg.is_empty() => msg.to_string(),
            _ => DEFAULT_SERVER_ERROR.to_string(),
        }
    }
}

/// Body of a `StreamData` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDataBody<T> {
    pub id: u64,
    #[serde(default)]
    pub seq: u64,
    pub payload: Tagged<T>,
}

/// Body of a `StreamEnd` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEndBody {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StreamEndBody {
    /// True if the server ended the stream with an error code or message.
    pub fn is_error(&self) -> bool {
        self.error_code.is_some() || self.error_message.is_some()
    }
}

/// Server -> client envelope with payloads decoded as `T`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage<T> {
    Response(ResponseBody<T>),
    Error(ErrorBody),
    StreamData(StreamDataBody<T>),
    StreamEnd(StreamEndBody),
}

/// Envelope with every payload skipped; only correlation keys and tags.
pub type ServerHeader = ServerMessage<IgnoredAny>;

/// Decode the routing header of a decompressed frame.
pub fn decode_header(bytes: &[u8]) -> Result<ServerHeader> {
    MsgPackCodec::decode(bytes)
}
