//! Wire compression negotiated through the WebSocket subprotocol.
//!
//! The whole encoded envelope is compressed after MessagePack encoding and
//! decompressed before decoding. The algorithm is fixed for the lifetime of a
//! session and is derived once from the subprotocol the server selected:
//!
//! | suffix    | algorithm |
//! |-----------|-----------|
//! | `+zstd`   | zstd      |
//! | `+brotli` | brotli    |
//! | `+gzip`   | gzip      |
//! | (none)    | identity  |

use std::fmt;
use std::io::{Read, Write};

use crate::error::{Result, TitanError};

/// zstd compression level used for outbound frames.
const ZSTD_LEVEL: i32 = 3;

/// Brotli quality (0-11) used for outbound frames.
const BROTLI_QUALITY: u32 = 5;

/// Brotli window size (log2).
const BROTLI_LGWIN: u32 = 22;

/// Buffer size for brotli streaming reader/writer.
const BROTLI_BUFFER_SIZE: usize = 4096;

/// Compression algorithm applied to every frame of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// No compression.
    None,
    /// gzip (RFC 1952).
    Gzip,
    /// Brotli (RFC 7932).
    Brotli,
    /// Zstandard.
    Zstd,
}

impl Compression {
    /// Default offer order, most preferred first.
    pub const PREFERENCE: [Compression; 4] = [
        Compression::Zstd,
        Compression::Brotli,
        Compression::Gzip,
        Compression::None,
    ];

    /// Subprotocol suffix advertising this algorithm (`""` for identity).
    pub fn suffix(self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => "+gzip",
            Compression::Brotli => "+brotli",
            Compression::Zstd => "+zstd",
        }
    }

    /// Derive the algorithm from a negotiated subprotocol token.
    ///
    /// Pure suffix match, checked zstd > brotli > gzip; anything else is identity.
    pub fn from_subprotocol(protocol: &str) -> Self {
        if protocol.ends_with(Compression::Zstd.suffix()) {
            Compression::Zstd
        } else if protocol.ends_with(Compression::Brotli.suffix()) {
            Compression::Brotli
        } else if protocol.ends_with(Compression::Gzip.suffix()) {
            Compression::Gzip
        } else {
            Compression::None
        }
    }

    /// Compress an encoded envelope.
    ///
    /// # Errors
    ///
    /// Returns [`TitanError::Encode`] if the compressor fails.
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data).map_err(encode_err("gzip"))?;
                encoder.finish().map_err(encode_err("gzip"))
            }
            Compression::Brotli => {
                let mut out = Vec::new();
                {
                    let mut writer = brotli::CompressorWriter::new(
                        &mut out,
                        BROTLI_BUFFER_SIZE,
                        BROTLI_QUALITY,
                        BROTLI_LGWIN,
                    );
                    writer.write_all(data).map_err(encode_err("brotli"))?;
                    writer.flush().map_err(encode_err("brotli"))?;
                }
                Ok(out)
            }
            Compression::Zstd => zstd::bulk::compress(data, ZSTD_LEVEL).map_err(encode_err("zstd")),
        }
    }

    /// Decompress an inbound frame.
    ///
    /// # Errors
    ///
    /// Returns [`TitanError::Decode`] on corrupt or truncated input.
    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut out = Vec::new();
                flate2::read::GzDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(decode_err("gzip"))?;
                Ok(out)
            }
            Compression::Brotli => {
                let mut out = Vec::new();
                brotli::Decompressor::new(data, BROTLI_BUFFER_SIZE)
                    .read_to_end(&mut out)
                    .map_err(decode_err("brotli"))?;
                Ok(out)
            }
            Compression::Zstd => zstd::stream::decode_all(data).map_err(decode_err("zstd")),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Brotli => "brotli",
            Compression::Zstd => "zstd",
        })
    }
}

fn encode_err(algo: &'static str) -> impl Fn(std::io::Error) -> TitanError {
    move |err| TitanError::Encode(format!("{algo} compress failed: {err}"))
}

fn decode_err(algo: &'static str) -> impl Fn(std::io::Error) -> TitanError {
    move |err| TitanError::Decode(format!("{algo} decompress failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample_payloads() -> Vec<Vec<u8>> {
        vec![
            Vec::new(),
            b"x".to_vec(),
            b"{ id: 0, data: { GetInfo: {} } }".to_vec(),
            (0..=255u8).cycle().take(64 * 1024).collect(),
            vec![0u8; 10_000],
        ]
    }

    #[test]
    fn test_round_trip_all_algorithms() {
        for algo in Compression::PREFERENCE {
            for payload in sample_payloads() {
                let compressed = algo.compress(&payload).unwrap();
                let restored = algo.decompress(&compressed).unwrap();
                assert_eq!(restored, payload, "{algo} round trip failed for {} bytes", payload.len());
            }
        }
    }

    #[test]
    fn test_compression_shrinks_repetitive_data() {
        let payload = vec![7u8; 10_000];
        for algo in [Compression::Gzip, Compression::Brotli, Compression::Zstd] {
            let compressed = algo.compress(&payload).unwrap();
            assert!(compressed.len() < payload.len(), "{algo} did not shrink input");
        }
    }

    #[test]
    fn test_identity_is_passthrough() {
        let payload = b"raw msgpack".to_vec();
        assert_eq!(Compression::None.compress(&payload).unwrap(), payload);
        assert_eq!(Compression::None.decompress(&payload).unwrap(), payload);
    }

    #[test]
    fn test_from_subprotocol_suffixes() {
        assert_eq!(
            Compression::from_subprotocol("v1.api.titan.ag+zstd"),
            Compression::Zstd
        );
        assert_eq!(
            Compression::from_subprotocol("v1.api.titan.ag+brotli"),
            Compression::Brotli
        );
        assert_eq!(
            Compression::from_subprotocol("v1.api.titan.ag+gzip"),
            Compression::Gzip
        );
        assert_eq!(
            Compression::from_subprotocol("v1.api.titan.ag"),
            Compression::None
        );
        assert_eq!(Compression::from_subprotocol(""), Compression::None);
    }

    #[test]
    fn test_corrupt_input_is_decode_error() {
        let garbage = b"definitely not compressed".to_vec();
        for algo in [Compression::Gzip, Compression::Brotli, Compression::Zstd] {
            let err = algo.decompress(&garbage).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DecodeError, "{algo} accepted garbage");
        }
    }

    #[test]
    fn test_truncated_input_is_decode_error() {
        let payload: Vec<u8> = (0..4096u32).flat_map(|n| n.to_le_bytes()).collect();
        for algo in [Compression::Gzip, Compression::Zstd] {
            let compressed = algo.compress(&payload).unwrap();
            let truncated = &compressed[..compressed.len() / 2];
            assert!(algo.decompress(truncated).is_err(), "{algo} accepted truncated input");
        }
    }

    #[test]
    fn test_suffix_and_display() {
        assert_eq!(Compression::Zstd.suffix(), "+zstd");
        assert_eq!(Compression::None.suffix(), "");
        assert_eq!(Compression::Brotli.to_string(), "brotli");
    }
}
