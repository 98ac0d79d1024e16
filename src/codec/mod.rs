//! Codec module - serialization and compression for wire frames.
//!
//! Every binary frame on the socket is `compress(encode(envelope))`:
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`, structs as maps)
//! - [`Compression`] - the per-session algorithm negotiated through the subprotocol
//!
//! # Design
//!
//! Codecs are marker types with static methods rather than trait objects.
//! The compression algorithm is a `Copy` enum fixed once per session.
//!
//! # Example
//!
//! ```
//! use titan_native_client::codec::{Compression, MsgPackCodec};
//!
//! let encoded = MsgPackCodec::encode(&"hello").unwrap();
//! let wire = Compression::Zstd.compress(&encoded).unwrap();
//!
//! let restored = Compression::Zstd.decompress(&wire).unwrap();
//! let decoded: String = MsgPackCodec::decode(&restored).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod compression;
mod msgpack;

pub use compression::Compression;
pub use msgpack::MsgPackCodec;

use crate::error::Result;

/// Encode a value and compress it into a wire frame.
pub fn encode_frame<T: serde::Serialize + ?Sized>(
    value: &T,
    compression: Compression,
) -> Result<Vec<u8>> {
    let encoded = MsgPackCodec::encode(value)?;
    compression.compress(&encoded)
}

/// Decompress a wire frame back into raw MessagePack bytes.
pub fn decompress_frame(frame: &[u8], compression: Compression) -> Result<Vec<u8>> {
    compression.decompress(frame)
}
