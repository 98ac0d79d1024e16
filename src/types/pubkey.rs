//! 32-byte Solana address.
//!
//! On the wire an address is always a MessagePack `bin` of exactly 32 bytes.
//! Base58 text is only accepted through [`FromStr`] and produced by
//! [`Display`](fmt::Display).

use std::fmt;
use std::str::FromStr;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TitanError;

/// Length of an address in bytes.
pub const PUBKEY_LEN: usize = 32;

/// Characters of rejected input echoed back in [`TitanError::InvalidAddress`].
const ADDRESS_PREVIEW_LEN: usize = 20;

/// A 32-byte account or mint address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Pubkey([u8; PUBKEY_LEN]);

impl Pubkey {
    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; PUBKEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; PUBKEY_LEN] {
        &self.0
    }

    /// Build from a slice, which must be exactly 32 bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; PUBKEY_LEN]>::try_from(bytes).ok().map(Self)
    }
}

impl From<[u8; PUBKEY_LEN]> for Pubkey {
    fn from(bytes: [u8; PUBKEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Pubkey {
    type Err = TitanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            let preview: String = s.chars().take(ADDRESS_PREVIEW_LEN).collect();
            TitanError::InvalidAddress(format!("{preview}..."))
        };

        if s.is_empty() {
            return Err(invalid());
        }

        let decoded = bs58::decode(s).into_vec().map_err(|e| {
            tracing::debug!("Failed to decode base58 address {:?}: {}", s, e);
            invalid()
        })?;

        Pubkey::try_from_slice(&decoded).ok_or_else(|| {
            tracing::debug!(
                "Invalid public key length: expected {} bytes, got {}",
                PUBKEY_LEN,
                decoded.len()
            );
            invalid()
        })
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({self})")
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PubkeyVisitor;

        impl<'de> Visitor<'de> for PubkeyVisitor {
            type Value = Pubkey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{PUBKEY_LEN} bytes")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Pubkey, E> {
                Pubkey::try_from_slice(v).ok_or_else(|| E::invalid_length(v.len(), &self))
            }

            // Some encoders emit byte arrays as arrays of small integers.
            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Pubkey, A::Error> {
                let mut bytes = [0u8; PUBKEY_LEN];
                for (i, slot) in bytes.iter_mut().enumerate() {
                    *slot = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                if seq.next_element::<u8>()?.is_some() {
                    return Err(de::Error::invalid_length(PUBKEY_LEN + 1, &self));
                }
                Ok(Pubkey(bytes))
            }
        }

        deserializer.deserialize_bytes(PubkeyVisitor)
    }
}
