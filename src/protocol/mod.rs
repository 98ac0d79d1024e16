//! Protocol module - envelopes, method names, and subprotocol negotiation.
//!
//! This module describes what travels inside each binary WebSocket frame:
//! - Request and server envelopes (method-keyed and data-type-keyed maps)
//! - The subprotocol tokens offered at handshake time

mod envelope;
mod subprotocol;

pub use envelope::{
    decode_header, ClientRequest, ErrorBody, ResponseBody, ServerHeader, ServerMessage,
    StreamDataBody, StreamEndBody, StreamInfo, Tagged, DEFAULT_SERVER_ERROR,
};
pub use subprotocol::{candidates, Negotiated, DEFAULT_SUBPROTOCOL_BASE};

/// Method names used as the single key of a request's `data` map.
pub mod methods {
    /// Server version and limits.
    pub const GET_INFO: &str = "GetInfo";
    /// Open a swap quote stream.
    pub const NEW_SWAP_QUOTE_STREAM: &str = "NewSwapQuoteStream";
    /// Stop a stream by id.
    pub const STOP_STREAM: &str = "StopStream";
}

/// Data-type tags used as the single key of a `StreamData` payload.
pub mod data_types {
    /// Payload of a swap quote stream.
    pub const SWAP_QUOTES: &str = "SwapQuotes";
}
