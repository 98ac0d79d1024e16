//! WebSocket connect and subprotocol handshake.
//!
//! - Offers every candidate subprotocol in one `Sec-WebSocket-Protocol` header
//! - Bounds the whole handshake (TCP, TLS, upgrade) by a connect timeout
//! - Reads back the server's selection and derives the session compression

use std::time::Duration;

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError, SubProtocolError};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::{Result, TitanError};
use crate::protocol::Negotiated;

/// Client WebSocket over plain TCP or TLS.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open socket and what was negotiated on it.
pub struct Connection {
    pub stream: WsStream,
    pub negotiated: Negotiated,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("negotiated", &self.negotiated)
            .finish_non_exhaustive()
    }
}

/// Append the `auth` query parameter to `url`.
///
/// `None` or an empty token leaves the URL unchanged (after validation).
pub fn auth_url(url: &str, token: Option<&str>) -> Result<String> {
    let mut parsed = Url::parse(url).map_err(|e| TitanError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(TitanError::InvalidUrl(format!(
                "{url}: unsupported scheme {other:?}, expected ws or wss"
            )))
        }
    }

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        parsed.query_pairs_mut().append_pair("auth", token);
    }
    Ok(parsed.into())
}

/// Open a WebSocket to `url`, offering `protocols` in preference order.
///
/// # Errors
///
/// - [`TitanError::ConnectionTimeout`] if the handshake does not finish within `timeout`;
///   the in-flight socket is dropped
/// - [`TitanError::NoProtocolSelected`] if the server picks none of `protocols`;
///   the socket is closed
/// - [`TitanError::InvalidUrl`] / [`TitanError::Handshake`] for everything else
pub async fn connect(url: &str, protocols: &[String], timeout: Duration) -> Result<Connection> {
    let mut request = url
        .into_client_request()
        .map_err(|e| TitanError::InvalidUrl(e.to_string()))?;

    if !protocols.is_empty() {
        let offered = HeaderValue::from_str(&protocols.join(", "))
            .map_err(|e| TitanError::Handshake(format!("invalid subprotocol list: {e}")))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, offered);
    }

    let (mut stream, response) = match tokio::time::timeout(timeout, connect_async(request)).await
    {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => return Err(map_connect_error(e)),
        Err(_) => {
            tracing::warn!("WebSocket handshake timed out after {:?}", timeout);
            return Err(TitanError::ConnectionTimeout(timeout));
        }
    };

    let selected = response
        .headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok());

    match Negotiated::from_selected(selected) {
        Ok(negotiated) => {
            tracing::debug!(
                protocol = %negotiated.protocol,
                compression = %negotiated.compression,
                "WebSocket connected"
            );
            Ok(Connection { stream, negotiated })
        }
        Err(e) => {
            if let Err(close_err) = stream.close(None).await {
                tracing::debug!("Close after failed negotiation: {}", close_err);
            }
            Err(e)
        }
    }
}

fn map_connect_error(err: WsError) -> TitanError {
    match err {
        WsError::Protocol(ProtocolError::SecWebSocketSubProtocolError(
            SubProtocolError::NoSubProtocol,
        )) => TitanError::NoProtocolSelected,
        WsError::Url(e) => TitanError::InvalidUrl(e.to_string()),
        other => {
            tracing::error!("WebSocket connection failed: {}", other);
            TitanError::Handshake(other.to_string())
        }
    }
}
