//! Client builder and facade.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring the session.
//! [`ClientBuilder::connect`] manages the startup:
//! 1. Append the auth token to the endpoint URL
//! 2. Open the WebSocket, offering one subprotocol per compression algorithm
//! 3. Spawn the writer task and the session dispatch loop
//!
//! The resulting [`Client`] is cheap to clone; all clones share one session.
//!
//! # Example
//!
//! ```ignore
//! use futures_util::StreamExt;
//! use titan_native_client::{Client, SwapQuoteRequestBuilder};
//!
//! #[tokio::main]
//! async fn main() -> titan_native_client::Result<()> {
//!     let client = Client::builder()
//!         .auth_token(std::env::var("TITAN_AUTH_TOKEN").ok())
//!         .connect("wss://fra.api.titan-sol.tech/api/v1/ws")
//!         .await?;
//!
//!     let info = client.get_info().await?;
//!     println!("protocol {}", info.protocol_version);
//!
//!     let request = SwapQuoteRequestBuilder::new(
//!         "So11111111111111111111111111111111111111112",
//!         "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
//!         1_000_000_000,
//!         "YourWalletAddressHere",
//!     )
//!     .build()?;
//!
//!     let (response, mut quotes) = client.new_swap_quote_stream(&request).await?;
//!     println!("stream {}", response.id);
//!     while let Some(update) = quotes.next().await {
//!         println!("{:?}", update?.best_quote());
//!     }
//!
//!     client.close().await
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::codec::{encode_frame, Compression, MsgPackCodec};
use crate::correlator::{PendingRequest, Reply, RequestIds};
use crate::error::{Result, TitanError};
use crate::events::{EventSink, ProtocolEvent, TracingSink};
use crate::protocol::{
    candidates, data_types, methods, ClientRequest, Negotiated, ServerMessage,
    DEFAULT_SUBPROTOCOL_BASE,
};
use crate::session::{spawn_session, Command, ConnectionLostCallback, SessionContext};
use crate::stream::{StreamSink, TypedSink, UpdateStream};
use crate::transport::{self, auth_url, Connection};
use crate::types::{ServerInfo, SwapQuoteRequest, SwapQuoteStreamResponse, SwapQuotes};
use crate::writer::{spawn_writer_task, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Default bound on the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time a request waits for its response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the endpoint URL.
pub const ENV_WS_URL: &str = "TITAN_WS_URL";
/// Environment variable holding the auth token.
pub const ENV_AUTH_TOKEN: &str = "TITAN_AUTH_TOKEN";
/// Environment variable overriding the connect timeout, in milliseconds.
pub const ENV_CONNECT_TIMEOUT_MS: &str = "TITAN_CONNECT_TIMEOUT_MS";
/// Environment variable overriding the request timeout, in milliseconds.
pub const ENV_REQUEST_TIMEOUT_MS: &str = "TITAN_REQUEST_TIMEOUT_MS";

/// Params of methods that take none: an empty map on the wire.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NoParams {}

#[derive(Debug, Serialize)]
struct StopStreamParams {
    id: u64,
}

/// Connection settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Read `TITAN_WS_URL`, `TITAN_AUTH_TOKEN`, `TITAN_CONNECT_TIMEOUT_MS`
    /// and `TITAN_REQUEST_TIMEOUT_MS`.
    ///
    /// Only the URL is required. Unparseable timeouts fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = lookup(ENV_WS_URL)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| TitanError::InvalidUrl(format!("{ENV_WS_URL} is not set")))?;

        Ok(Self {
            url,
            auth_token: lookup(ENV_AUTH_TOKEN).filter(|t| !t.is_empty()),
            connect_timeout: millis_or(&lookup, ENV_CONNECT_TIMEOUT_MS, DEFAULT_CONNECT_TIMEOUT),
            request_timeout: millis_or(&lookup, ENV_REQUEST_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT),
        })
    }

    /// A builder preloaded with these settings.
    pub fn builder(&self) -> ClientBuilder {
        ClientBuilder::new()
            .auth_token(self.auth_token.clone())
            .connect_timeout(self.connect_timeout)
            .request_timeout(self.request_timeout)
    }

    /// Connect with these settings and defaults for everything else.
    pub async fn connect(&self) -> Result<Client> {
        self.builder().connect(&self.url).await
    }
}

fn millis_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => Duration::from_millis(ms),
            _ => {
                tracing::warn!("Ignoring {}={:?}; using {:?}", key, raw, default);
                default
            }
        },
    }
}

/// Builder for configuring and connecting a client.
pub struct ClientBuilder {
    auth_token: Option<String>,
    subprotocol_base: String,
    compression_preference: Vec<Compression>,
    connect_timeout: Duration,
    request_timeout: Duration,
    channel_capacity: usize,
    event_sink: Arc<dyn EventSink>,
    on_connection_lost: Option<ConnectionLostCallback>,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            auth_token: None,
            subprotocol_base: DEFAULT_SUBPROTOCOL_BASE.to_string(),
            compression_preference: Compression::PREFERENCE.to_vec(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            event_sink: Arc::new(TracingSink),
            on_connection_lost: None,
        }
    }

    /// Bearer token sent as the `auth` query parameter. `None` or empty sends none.
    pub fn auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    /// Subprotocol base token.
    ///
    /// Default: `v1.api.titan.ag`
    pub fn subprotocol_base(mut self, base: impl Into<String>) -> Self {
        self.subprotocol_base = base.into();
        self
    }

    /// Compression algorithms to offer, most preferred first.
    ///
    /// Default: zstd, brotli, gzip, none
    pub fn compression_preference(mut self, preference: Vec<Compression>) -> Self {
        self.compression_preference = preference;
        self
    }

    /// Set the handshake timeout.
    ///
    /// Default: 10 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-request timeout.
    ///
    /// Default: 30 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Where protocol events are recorded.
    ///
    /// Default: [`TracingSink`]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Called once if the connection drops without a normal close.
    pub fn on_connection_lost<F>(mut self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_connection_lost = Some(Box::new(callback));
        self
    }

    /// Open the session.
    ///
    /// This will:
    /// 1. Validate `url` and append the auth token
    /// 2. Perform the handshake within the connect timeout
    /// 3. Derive compression from the selected subprotocol
    /// 4. Spawn the writer task and the dispatch loop
    pub async fn connect(self, url: &str) -> Result<Client> {
        let events = self.event_sink;
        let report = |e: TitanError| {
            events.emit(ProtocolEvent::error(&e));
            e
        };

        let url = auth_url(url, self.auth_token.as_deref()).map_err(report)?;
        let offered = candidates(&self.subprotocol_base, &self.compression_preference);

        let Connection { stream, negotiated } =
            transport::connect(&url, &offered, self.connect_timeout)
                .await
                .map_err(report)?;

        let (write, read) = stream.split();
        let (writer, _writer_task) = spawn_writer_task(write, self.channel_capacity);

        let open = Arc::new(AtomicBool::new(true));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        spawn_session(
            read,
            commands_rx,
            SessionContext {
                compression: negotiated.compression,
                writer: writer.clone(),
                events: events.clone(),
                open: open.clone(),
                on_connection_lost: self.on_connection_lost,
            },
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                ids: RequestIds::new(),
                commands: commands_tx,
                writer,
                negotiated,
                request_timeout: self.request_timeout,
                events,
                open,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by every [`Client`] clone and every open [`UpdateStream`].
pub(crate) struct ClientInner {
    ids: RequestIds,
    commands: mpsc::UnboundedSender<Command>,
    writer: WriterHandle,
    negotiated: Negotiated,
    request_timeout: Duration,
    events: Arc<dyn EventSink>,
    open: Arc<AtomicBool>,
}

impl ClientInner {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.writer.is_closed()
    }

    /// Send one request and wait for its reply.
    ///
    /// The id is consumed even if the request fails before reaching the socket.
    async fn request<P: Serialize + ?Sized>(
        &self,
        method: &str,
        params: &P,
        sink: Option<Box<dyn StreamSink>>,
    ) -> Result<Reply> {
        if !self.is_open() {
            return Err(TitanError::NotConnected);
        }

        let id = self.ids.next_id();
        let frame = encode_frame(
            &ClientRequest::new(id, method, params),
            self.negotiated.compression,
        )?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Register {
                id,
                pending: PendingRequest::new(method, reply_tx, sink),
            })
            .map_err(|_| TitanError::NotConnected)?;
        self.events.emit(ProtocolEvent::RequestIssued {
            id,
            method: method.to_string(),
        });

        if let Err(e) = self.writer.send(Bytes::from(frame)).await {
            let _ = self.commands.send(Command::Expire { id });
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(outcome)) => outcome,
            // Loop exited without answering.
            Ok(Err(_)) => Err(TitanError::TransportClosed),
            Err(_) => {
                let _ = self.commands.send(Command::Expire { id });
                let err = TitanError::Timeout {
                    method: method.to_string(),
                };
                self.events.emit(ProtocolEvent::error(&err));
                Err(err)
            }
        }
    }

    /// Deregister a stream's sink. Never touches the network.
    pub(crate) fn cancel_stream(&self, id: u64) {
        let _ = self.commands.send(Command::CancelStream { id });
    }

    pub(crate) async fn stop_stream(&self, id: u64) -> Result<()> {
        self.request(methods::STOP_STREAM, &StopStreamParams { id }, None)
            .await
            .map(|_| ())
    }
}

/// Decode the method result out of a `Response` frame.
fn decode_result<R: DeserializeOwned>(frame: &[u8]) -> Result<R> {
    match MsgPackCodec::decode::<ServerMessage<R>>(frame)? {
        ServerMessage::Response(body) => Ok(body.data.value),
        _ => Err(TitanError::Decode("expected Response envelope".into())),
    }
}

/// A connected session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect with default settings.
    pub async fn connect(url: &str) -> Result<Self> {
        ClientBuilder::new().connect(url).await
    }

    /// Subprotocol the server selected.
    pub fn protocol(&self) -> &str {
        &self.inner.negotiated.protocol
    }

    /// Compression in effect for this session.
    pub fn compression(&self) -> Compression {
        self.inner.negotiated.compression
    }

    /// False once the session is closing or closed.
    pub fn is_connected(&self) -> bool {
        self.inner.is_open()
    }

    /// The sink protocol events are recorded to.
    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.inner.events
    }

    /// Call `method` and decode its result as `R`.
    ///
    /// # Errors
    ///
    /// `NotConnected`, `ServerError`, `Timeout`, `TransportClosed`, `Encode` or `Decode`.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let reply = self.inner.request(method, params, None).await?;
        decode_result(&reply.frame)
    }

    /// Call a stream-opening `method`.
    ///
    /// Returns the method's result and the stream of `T` updates. The stream's
    /// sink is installed by the dispatch loop together with the response, so
    /// no update that follows the response can be missed.
    ///
    /// # Errors
    ///
    /// As [`call`](Self::call), plus `MissingStreamInfo` if the response
    /// carries no stream metadata.
    pub async fn new_stream<P, R, T>(&self, method: &str, params: &P) -> Result<(R, UpdateStream<T>)>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
        T: DeserializeOwned + Send + 'static,
    {
        let (sink, rx) = TypedSink::<T>::channel();
        let reply = self
            .inner
            .request(method, params, Some(Box::new(sink)))
            .await?;

        let Some(info) = reply.stream else {
            let err = TitanError::MissingStreamInfo;
            self.inner.events.emit(ProtocolEvent::error(&err));
            return Err(err);
        };

        // Built before decoding the result so a decode failure still stops the stream.
        let stream = UpdateStream::new(info, rx, self.inner.clone());
        let result = decode_result(&reply.frame)?;
        Ok((result, stream))
    }

    /// Server protocol version and limits.
    pub async fn get_info(&self) -> Result<ServerInfo> {
        self.call(methods::GET_INFO, &NoParams {}).await
    }

    /// Open a swap quote stream.
    ///
    /// The returned response carries the stream id alongside the server's
    /// effective `intervalMs`/`numQuotes`.
    pub async fn new_swap_quote_stream(
        &self,
        request: &SwapQuoteRequest,
    ) -> Result<(SwapQuoteStreamResponse, UpdateStream<SwapQuotes>)> {
        let (mut response, stream): (SwapQuoteStreamResponse, UpdateStream<SwapQuotes>) = self
            .new_stream(methods::NEW_SWAP_QUOTE_STREAM, request)
            .await?;

        if stream.data_type() != data_types::SWAP_QUOTES {
            tracing::warn!(
                "Stream {} announced data type {:?}, expected {}",
                stream.id(),
                stream.data_type(),
                data_types::SWAP_QUOTES
            );
        }
        response.id = stream.id();
        Ok((response, stream))
    }

    /// Ask the server to stop stream `id`.
    pub async fn stop_stream(&self, id: u64) -> Result<()> {
        self.call::<_, IgnoredAny>(methods::STOP_STREAM, &StopStreamParams { id })
            .await
            .map(|_| ())
    }

    /// Close the session with a normal close frame.
    ///
    /// Resolves once the server confirms the close, or after the request
    /// timeout if it never does. Resolves immediately if already closed.
    pub async fn close(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        if self.inner.commands.send(Command::Close { done: done_tx }).is_err() {
            return Ok(());
        }
        if tokio::time::timeout(self.inner.request_timeout, done_rx)
            .await
            .is_err()
        {
            tracing::warn!("Server did not confirm close within {:?}", self.inner.request_timeout);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("protocol", &self.inner.negotiated.protocol)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new();
        assert_eq!(builder.subprotocol_base, "v1.api.titan.ag");
        assert_eq!(builder.compression_preference, Compression::PREFERENCE.to_vec());
        assert_eq!(builder.connect_timeout, Duration::from_secs(10));
        assert_eq!(builder.request_timeout, Duration::from_secs(30));
        assert_eq!(builder.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert!(builder.on_connection_lost.is_none());
    }

    #[test]
    fn test_builder_configuration() {
        let builder = Client::builder()
            .auth_token(Some("jwt".into()))
            .subprotocol_base("v2.test")
            .compression_preference(vec![Compression::Gzip])
            .connect_timeout(Duration::from_millis(500))
            .request_timeout(Duration::from_millis(250))
            .channel_capacity(8)
            .on_connection_lost(|| {});

        assert_eq!(builder.auth_token.as_deref(), Some("jwt"));
        assert_eq!(builder.subprotocol_base, "v2.test");
        assert_eq!(builder.compression_preference, vec![Compression::Gzip]);
        assert_eq!(builder.connect_timeout, Duration::from_millis(500));
        assert_eq!(builder.request_timeout, Duration::from_millis(250));
        assert_eq!(builder.channel_capacity, 8);
        assert!(builder.on_connection_lost.is_some());
    }

    #[test]
    fn test_config_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_WS_URL, "wss://example.com/ws"),
            (ENV_AUTH_TOKEN, "tok"),
            (ENV_CONNECT_TIMEOUT_MS, "2500"),
            (ENV_REQUEST_TIMEOUT_MS, "soon"),
        ]);
        let config = ClientConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.url, "wss://example.com/ws");
        assert_eq!(config.auth_token.as_deref(), Some("tok"));
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_config_requires_url() {
        let err = ClientConfig::from_lookup(|_| None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidUrl);
    }

    #[test]
    fn test_config_empty_token_is_none() {
        let config = ClientConfig::from_lookup(|k| match k {
            ENV_WS_URL => Some("ws://localhost:1/ws".into()),
            ENV_AUTH_TOKEN => Some(String::new()),
            _ => None,
        })
        .unwrap();
        assert!(config.auth_token.is_none());
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_no_params_is_empty_map() {
        assert_eq!(MsgPackCodec::encode(&NoParams {}).unwrap(), vec![0x80]);
    }

    #[test]
    fn test_stop_stream_params_shape() {
        let bytes = MsgPackCodec::encode(&ClientRequest::new(
            4,
            methods::STOP_STREAM,
            &StopStreamParams { id: 7 },
        ))
        .unwrap();

        #[derive(serde::Deserialize)]
        struct Shape {
            id: u64,
            data: HashMap<String, HashMap<String, u64>>,
        }
        let shape: Shape = MsgPackCodec::decode(&bytes).unwrap();
        assert_eq!(shape.id, 4);
        assert_eq!(shape.data["StopStream"]["id"], 7);
    }

    #[test]
    fn test_decode_result_rejects_other_envelopes() {
        let bytes = MsgPackCodec::encode(&ServerMessage::<u64>::StreamEnd(
            crate::protocol::StreamEndBody {
                id: 1,
                error_code: None,
                error_message: None,
            },
        ))
        .unwrap();
        let err = decode_result::<u64>(&bytes).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DecodeError);
    }
}
