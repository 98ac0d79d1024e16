//! Subprotocol negotiation.
//!
//! `v1.api.titan.ag` is a subprotocol identifier, not an endpoint host. The
//! client offers one token per compression algorithm in preference order and
//! the server picks one during the handshake:
//!
//! ```text
//! Sec-WebSocket-Protocol: v1.api.titan.ag+zstd, v1.api.titan.ag+brotli, v1.api.titan.ag+gzip, v1.api.titan.ag
//! ```

use crate::codec::Compression;
use crate::error::{Result, TitanError};

/// Default subprotocol base token.
pub const DEFAULT_SUBPROTOCOL_BASE: &str = "v1.api.titan.ag";

/// Candidate tokens for `base`, one per algorithm, in the given order.
pub fn candidates(base: &str, preference: &[Compression]) -> Vec<String> {
    preference
        .iter()
        .map(|c| format!("{base}{}", c.suffix()))
        .collect()
}

/// Subprotocol the server selected, and the compression it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Token exactly as returned by the server.
    pub protocol: String,
    /// Compression derived from the token suffix.
    pub compression: Compression,
}

impl Negotiated {
    /// Interpret the server's `Sec-WebSocket-Protocol` answer.
    ///
    /// Absent or blank selection is [`TitanError::NoProtocolSelected`].
    pub fn from_selected(selected: Option<&str>) -> Result<Self> {
        let protocol = selected
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(TitanError::NoProtocolSelected)?;

        Ok(Self {
            protocol: protocol.to_string(),
            compression: Compression::from_subprotocol(protocol),
        })
    }
}
