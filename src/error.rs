//! Error types for titan-native-client.
//!
//! Every failure carries a human-readable message (its `Display`) and a
//! machine-checkable [`ErrorKind`] (via [`TitanError::kind`]), so the same
//! value can be logged and shown in a UI.

use std::fmt;

use thiserror::Error;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum TitanError {
    /// The session is not open (never connected, closing, or closed).
    #[error("WebSocket is not connected")]
    NotConnected,

    /// The WebSocket handshake did not complete in time.
    #[error("Connection timeout after {0:?}")]
    ConnectionTimeout(std::time::Duration),

    /// The server accepted the socket but selected none of the offered subprotocols.
    #[error("No protocol selected during handshake")]
    NoProtocolSelected,

    /// The socket closed while the operation was outstanding.
    #[error("WebSocket closed")]
    TransportClosed,

    /// No response arrived for the request before its deadline.
    #[error("Request timeout: {method}")]
    Timeout {
        /// Method name of the request that timed out.
        method: String,
    },

    /// The server answered the request with an `Error` envelope.
    #[error("Server error: {0}")]
    ServerError(String),

    /// An inbound frame could not be decompressed or decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// An outbound value could not be encoded or compressed.
    #[error("Encode error: {0}")]
    Encode(String),

    /// A streaming call's response carried no stream metadata.
    #[error("No stream info in response")]
    MissingStreamInfo,

    /// An address was not valid base58 or did not decode to 32 bytes.
    #[error("Invalid Solana address: {0}")]
    InvalidAddress(String),

    /// The endpoint URL could not be parsed or turned into a handshake request.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The WebSocket handshake failed for a reason other than timeout or protocol selection.
    #[error("WebSocket connection failed: {0}")]
    Handshake(String),

    /// The server ended a stream with an error code and/or message.
    #[error("Stream {stream_id} ended with error{}: {}", code_suffix(.code), .message.as_deref().unwrap_or("unknown"))]
    StreamFailed {
        /// Stream id the error belongs to.
        stream_id: u64,
        /// Server-supplied error code, if any.
        code: Option<u32>,
        /// Server-supplied error message, if any.
        message: Option<String>,
    },
}

fn code_suffix(code: &Option<u32>) -> String {
    code.map(|c| format!(" {c}")).unwrap_or_default()
}

/// Machine-checkable classification of a [`TitanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`TitanError::NotConnected`].
    NotConnected,
    /// See [`TitanError::ConnectionTimeout`].
    ConnectionTimeout,
    /// See [`TitanError::NoProtocolSelected`].
    NoProtocolSelected,
    /// See [`TitanError::TransportClosed`].
    TransportClosed,
    /// See [`TitanError::Timeout`].
    Timeout,
    /// See [`TitanError::ServerError`].
    ServerError,
    /// See [`TitanError::Decode`].
    DecodeError,
    /// See [`TitanError::Encode`].
    EncodeError,
    /// See [`TitanError::MissingStreamInfo`].
    MissingStreamInfo,
    /// See [`TitanError::InvalidAddress`].
    InvalidAddress,
    /// See [`TitanError::InvalidUrl`].
    InvalidUrl,
    /// See [`TitanError::Handshake`].
    Handshake,
    /// See [`TitanError::StreamFailed`].
    StreamFailed,
}

impl ErrorKind {
    /// Stable snake_case name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotConnected => "not_connected",
            ErrorKind::ConnectionTimeout => "connection_timeout",
            ErrorKind::NoProtocolSelected => "no_protocol_selected",
            ErrorKind::TransportClosed => "transport_closed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServerError => "server_error",
            ErrorKind::DecodeError => "decode_error",
            ErrorKind::EncodeError => "encode_error",
            ErrorKind::MissingStreamInfo => "missing_stream_info",
            ErrorKind::InvalidAddress => "invalid_address",
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::Handshake => "handshake",
            ErrorKind::StreamFailed => "stream_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TitanError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TitanError::NotConnected => ErrorKind::NotConnected,
            TitanError::ConnectionTimeout(_) => ErrorKind::ConnectionTimeout,
            TitanError::NoProtocolSelected => ErrorKind::NoProtocolSelected,
            TitanError::TransportClosed => ErrorKind::TransportClosed,
            TitanError::Timeout { .. } => ErrorKind::Timeout,
            TitanError::ServerError(_) => ErrorKind::ServerError,
            TitanError::Decode(_) => ErrorKind::DecodeError,
            TitanError::Encode(_) => ErrorKind::EncodeError,
            TitanError::MissingStreamInfo => ErrorKind::MissingStreamInfo,
            TitanError::InvalidAddress(_) => ErrorKind::InvalidAddress,
            TitanError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            TitanError::Handshake(_) => ErrorKind::Handshake,
            TitanError::StreamFailed { .. } => ErrorKind::StreamFailed,
        }
    }
}

impl From<rmp_serde::encode::Error> for TitanError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        TitanError::Encode(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for TitanError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        TitanError::Decode(err.to_string())
    }
}

/// Result type alias using TitanError.
pub type Result<T> = std::result::Result<T, TitanError>;
