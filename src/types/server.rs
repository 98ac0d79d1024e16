//! `GetInfo` result: protocol version and server-side limits.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Inclusive range with the value the server uses when the client sends none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
    pub default: T,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    /// True if `value` lies within `[min, max]`.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp `value` into `[min, max]`.
    pub fn clamp(&self, value: T) -> T {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteUpdateSettings {
    pub interval_ms: Bounds<u64>,
    pub num_quotes: Bounds<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwapSettings {
    pub slippage_bps: Bounds<u16>,
    pub only_direct_routes: bool,
    pub add_size_constraint: bool,
    pub size_constraint: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionSettings {
    pub close_input_token_account: bool,
    pub create_output_token_account: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Maximum streams one connection may hold open at once.
    pub concurrent_streams: u32,
}

/// Server limits and defaults. Sections missing from the response decode as defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub quote_update: QuoteUpdateSettings,
    pub swap: SwapSettings,
    pub transaction: TransactionSettings,
    pub connection: ConnectionSettings,
}

/// Result of `GetInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub protocol_version: ProtocolVersion,
    #[serde(default)]
    pub settings: ServerSettings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MsgPackCodec;

    #[test]
    fn test_version_only_response() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire {
            protocol_version: ProtocolVersion,
        }

        let bytes = MsgPackCodec::encode(&Wire {
            protocol_version: ProtocolVersion {
                major: 1,
                minor: 0,
                patch: 0,
            },
        })
        .unwrap();

        let info: ServerInfo = MsgPackCodec::decode(&bytes).unwrap();
        assert_eq!(info.protocol_version.to_string(), "1.0.0");
        assert_eq!(info.settings, ServerSettings::default());
    }

    #[test]
    fn test_full_settings_round_trip() {
        let info = ServerInfo {
            protocol_version: ProtocolVersion {
                major: 1,
                minor: 2,
                patch: 3,
            },
            settings: ServerSettings {
                quote_update: QuoteUpdateSettings {
                    interval_ms: Bounds {
                        min: 100,
                        max: 10_000,
                        default: 1000,
                    },
                    num_quotes: Bounds {
                        min: 1,
                        max: 10,
                        default: 3,
                    },
                },
                swap: SwapSettings {
                    slippage_bps: Bounds {
                        min: 0,
                        max: 10_000,
                        default: 50,
                    },
                    only_direct_routes: false,
                    add_size_constraint: true,
                    size_constraint: 1232,
                },
                transaction: TransactionSettings {
                    close_input_token_account: false,
                    create_output_token_account: true,
                },
                connection: ConnectionSettings {
                    concurrent_streams: 4,
                },
            },
        };

        let bytes = MsgPackCodec::encode(&info).unwrap();
        let decoded: ServerInfo = MsgPackCodec::decode(&bytes).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_bounds_clamp() {
        let bounds = Bounds {
            min: 100u64,
            max: 5000,
            default: 1000,
        };
        assert!(bounds.contains(100));
        assert!(!bounds.contains(99));
        assert_eq!(bounds.clamp(10), 100);
        assert_eq!(bounds.clamp(9000), 5000);
        assert_eq!(bounds.clamp(750), 750);
    }
}
