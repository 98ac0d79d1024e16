//! Swap quote request and stream payload types.
//!
//! Field names follow the server's camelCase convention with two exceptions
//! the server expects verbatim: `num_quotes` in [`QuoteUpdateParams`] and
//! `fee_bps` in [`PlatformFee`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Pubkey;

/// Which side of the swap `amount` fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SwapMode {
    /// `amount` is the exact input; output is estimated.
    #[default]
    ExactIn,
    /// `amount` is the exact output; input is estimated.
    ExactOut,
}

impl SwapMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SwapMode::ExactIn => "ExactIn",
            SwapMode::ExactOut => "ExactOut",
        }
    }
}

impl fmt::Display for SwapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ExactIn" => Ok(SwapMode::ExactIn),
            "ExactOut" => Ok(SwapMode::ExactOut),
            other => Err(format!("unknown swap mode: {other}")),
        }
    }
}

// Plain strings on the wire, never enum maps.
impl Serialize for SwapMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SwapMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// `swap` section of a quote request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapParams {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Raw token units (lamports for SOL).
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_mode: Option<SwapMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage_bps: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_direct_routes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dexes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_dexes: Option<Vec<String>>,
}

/// `transaction` section of a quote request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionParams {
    pub user_public_key: Pubkey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_input_token_account: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_output_token_account: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_account: Option<Pubkey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_bps: Option<u16>,
}

/// `update` section of a quote request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuoteUpdateParams {
    #[serde(
        rename = "intervalMs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub interval_ms: Option<u64>,
    /// Snake case on the wire.
    #[serde(
        rename = "num_quotes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub num_quotes: Option<u32>,
}

/// Params of `NewSwapQuoteStream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuoteRequest {
    pub swap: SwapParams,
    pub transaction: TransactionParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<QuoteUpdateParams>,
}

/// Result of `NewSwapQuoteStream`, with the stream id folded in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuoteStreamResponse {
    /// Stream id from the response's stream metadata.
    #[serde(default)]
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_quotes: Option<u32>,
}

/// One hop of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    pub amm_key: Pubkey,
    pub label: String,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    /// Share of the input routed through this step, in parts per billion.
    pub alloc_ppb: u32,
    #[serde(default)]
    pub context_slot: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_mint: Option<Pubkey>,
}

/// Account reference inside an [`Instruction`]. Keys are single letters on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    #[serde(rename = "p")]
    pub pubkey: Pubkey,
    #[serde(rename = "s")]
    pub is_signer: bool,
    #[serde(rename = "w")]
    pub is_writable: bool,
}

/// Compact transaction instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(rename = "p")]
    pub program_id: Pubkey,
    #[serde(rename = "a")]
    pub accounts: Vec<AccountMeta>,
    #[serde(rename = "d", with = "serde_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFee {
    pub amount: u64,
    pub fee_bps: u16,
}

/// A single provider's quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub in_amount: u64,
    pub out_amount: u64,
    pub slippage_bps: u16,
    #[serde(default)]
    pub steps: Vec<RouteStep>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub address_lookup_tables: Vec<Pubkey>,
    #[serde(default)]
    pub context_slot: u64,
    #[serde(default)]
    pub time_taken_ns: u64,
    #[serde(default)]
    pub compute_units: u64,
    #[serde(default)]
    pub compute_units_safe: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_fee: Option<PlatformFee>,
}

/// One `SwapQuotes` stream update: every provider's current quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuotes {
    pub id: String,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub swap_mode: SwapMode,
    pub amount: u64,
    /// Keyed by provider name.
    #[serde(default)]
    pub quotes: BTreeMap<String, Quote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_slot: Option<u64>,
}

impl SwapQuotes {
    /// Provider and quote with the highest `out_amount`.
    pub fn best_quote(&self) -> Option<(&str, &Quote)> {
        self.quotes
            .iter()
            .max_by_key(|(_, q)| q.out_amount)
            .map(|(provider, q)| (provider.as_str(), q))
    }

    /// All quotes ordered by `out_amount`, best first.
    pub fn ranked(&self) -> Vec<(&str, &Quote)> {
        let mut ranked: Vec<_> = self
            .quotes
            .iter()
            .map(|(provider, q)| (provider.as_str(), q))
            .collect();
        ranked.sort_by(|a, b| b.1.out_amount.cmp(&a.1.out_amount));
        ranked
    }
}
