//! Typed request and response payloads.
//!
//! All 64-bit quantities are `u64` and all addresses are [`Pubkey`], so no
//! amount passes through a float and no address travels as text.

mod pubkey;
mod server;
mod swap;

pub use pubkey::{Pubkey, PUBKEY_LEN};
pub use server::{
    Bounds, ConnectionSettings, ProtocolVersion, QuoteUpdateSettings, ServerInfo, ServerSettings,
    SwapSettings, TransactionSettings,
};
pub use swap::{
    AccountMeta, Instruction, PlatformFee, Quote, QuoteUpdateParams, RouteStep, SwapMode,
    SwapParams, SwapQuoteRequest, SwapQuoteStreamResponse, SwapQuotes, TransactionParams,
};
