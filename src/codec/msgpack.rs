//! MsgPack codec using `rmp-serde`.
//!
//! **CRITICAL**: Always use `to_vec_named`, NEVER `to_vec`!
//! The server keys every envelope and payload by field name
//! (`{ id, data: { GetInfo: {} } }`), so structs must go out as maps.
//!
//! # 64-bit integers
//!
//! Amounts, slots and stream ids are `u64` on both sides. `rmp` writes the
//! narrowest integer marker that holds the value and reads any integer marker
//! back into a `u64` without going through a float, so values past 2^53 survive
//! a round trip. Encoding and decoding both go through this one type, which
//! keeps the request side and the response side on the same configuration.
//!
//! # Example
//!
//! ```
//! use titan_native_client::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Amount {
//!     amount: u64,
//! }
//!
//! let value = Amount { amount: u64::MAX };
//! let encoded = MsgPackCodec::encode(&value).unwrap();
//! let decoded: Amount = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, value);
//! ```

use crate::error::Result;

/// MessagePack codec for envelopes and payloads.
///
/// Uses `rmp_serde::to_vec_named` so structs are serialized as maps
/// (with field names) rather than arrays (positional).
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns [`TitanError::Encode`](crate::TitanError::Encode) if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        // CRITICAL: to_vec_named, NOT to_vec!
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns [`TitanError::Decode`](crate::TitanError::Decode) if the bytes cannot be deserialized to `T`.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
