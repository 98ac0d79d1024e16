//! # titan-native-client
//!
//! Native client for the Titan swap quote API.
//!
//! One persistent WebSocket carries binary MessagePack envelopes, optionally
//! compressed. Requests are correlated to responses by id, and quote streams
//! are demultiplexed by server-assigned stream id.
//!
//! ## Architecture
//!
//! - **Handshake**: the client offers `v1.api.titan.ag+zstd`, `+brotli`,
//!   `+gzip` and the bare token; the server's choice fixes compression for
//!   the whole session
//! - **Dispatch loop**: a single task owns the pending-request and stream
//!   tables and routes every inbound frame
//! - **Writer task**: a single task owns the socket's write half
//!
//! ## Example
//!
//! ```ignore
//! use titan_native_client::ClientConfig;
//!
//! #[tokio::main]
//! async fn main() -> titan_native_client::Result<()> {
//!     let client = ClientConfig::from_env()?.connect().await?;
//!     let info = client.get_info().await?;
//!     println!("protocol {} via {}", info.protocol_version, client.protocol());
//!     client.close().await
//! }
//! ```

pub mod codec;
pub mod error;
pub mod events;
pub mod protocol;
pub mod request;
pub mod transport;
pub mod types;

mod client;
mod correlator;
mod session;
mod stream;
mod writer;

pub use client::{
    Client, ClientBuilder, ClientConfig, NoParams, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use codec::Compression;
pub use error::{ErrorKind, Result, TitanError};
pub use events::{EventSink, LogEntry, LogFilter, LogStore, ProtocolEvent, TracingSink};
pub use request::SwapQuoteRequestBuilder;
pub use stream::{StreamState, UpdateStream};
pub use types::{Pubkey, ServerInfo, SwapQuoteRequest, SwapQuoteStreamResponse, SwapQuotes};
