//! Transport module - WebSocket connection setup.
//!
//! One persistent full-duplex socket per session. Only binary frames carry
//! envelopes; the session loop and writer task take the socket from here.

mod websocket;

pub use websocket::{auth_url, connect, Connection, WsStream};
