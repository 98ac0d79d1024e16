//! Swap quote request construction.
//!
//! Addresses arrive as base58 text and are validated here, before any frame
//! is built, so a malformed address never reaches the socket.
//!
//! # Example
//!
//! ```
//! use titan_native_client::request::SwapQuoteRequestBuilder;
//!
//! let request = SwapQuoteRequestBuilder::new(
//!     "So11111111111111111111111111111111111111112",
//!     "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
//!     1_000_000_000,
//!     "11111111111111111111111111111111",
//! )
//! .slippage_bps(100)
//! .num_quotes(10)
//! .build()
//! .unwrap();
//!
//! assert_eq!(request.swap.amount, 1_000_000_000);
//! assert_eq!(request.update.unwrap().num_quotes, Some(10));
//! ```

use crate::error::Result;
use crate::types::{
    Pubkey, QuoteUpdateParams, SwapMode, SwapParams, SwapQuoteRequest, TransactionParams,
};

/// Slippage sent when none is configured.
pub const DEFAULT_SLIPPAGE_BPS: u16 = 50;

/// Update interval sent with `num_quotes` when none is configured.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Decode a base58 address into 32 raw bytes.
///
/// # Errors
///
/// [`TitanError::InvalidAddress`](crate::TitanError::InvalidAddress) if the text is
/// empty, not base58, or not exactly 32 bytes once decoded.
pub fn pubkey_from_str(address: &str) -> Result<Pubkey> {
    address.parse()
}

/// Fluent builder for [`SwapQuoteRequest`].
///
/// Optional fields are only emitted when they carry a value: `onlyDirectRoutes`
/// only when true, `dexes`/`excludeDexes` only when non-empty, and the `update`
/// block only when `num_quotes` is set and non-zero.
#[derive(Debug, Clone)]
pub struct SwapQuoteRequestBuilder {
    input_mint: String,
    output_mint: String,
    amount: u64,
    user_public_key: String,
    swap_mode: SwapMode,
    slippage_bps: u16,
    only_direct_routes: bool,
    dexes: Vec<String>,
    exclude_dexes: Vec<String>,
    interval_ms: Option<u64>,
    num_quotes: Option<u32>,
}

impl SwapQuoteRequestBuilder {
    /// Start a request. `amount` is in raw token units.
    pub fn new(
        input_mint: impl Into<String>,
        output_mint: impl Into<String>,
        amount: u64,
        user_public_key: impl Into<String>,
    ) -> Self {
        Self {
            input_mint: input_mint.into(),
            output_mint: output_mint.into(),
            amount,
            user_public_key: user_public_key.into(),
            swap_mode: SwapMode::default(),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            only_direct_routes: false,
            dexes: Vec::new(),
            exclude_dexes: Vec::new(),
            interval_ms: None,
            num_quotes: None,
        }
    }

    /// Default: `ExactIn`.
    pub fn swap_mode(mut self, mode: SwapMode) -> Self {
        self.swap_mode = mode;
        self
    }

    /// Default: 50 (0.5%).
    pub fn slippage_bps(mut self, bps: u16) -> Self {
        self.slippage_bps = bps;
        self
    }

    /// Skip multi-hop routes.
    pub fn only_direct_routes(mut self, only_direct: bool) -> Self {
        self.only_direct_routes = only_direct;
        self
    }

    /// Restrict routing to these venues.
    pub fn dexes<I, S>(mut self, dexes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dexes = dexes.into_iter().map(Into::into).collect();
        self
    }

    /// Never route through these venues.
    pub fn exclude_dexes<I, S>(mut self, dexes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_dexes = dexes.into_iter().map(Into::into).collect();
        self
    }

    /// Update interval. Only sent together with [`num_quotes`](Self::num_quotes).
    pub fn interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    /// Number of quotes per update.
    pub fn num_quotes(mut self, num_quotes: u32) -> Self {
        self.num_quotes = Some(num_quotes);
        self
    }

    /// Validate addresses and assemble the request.
    ///
    /// # Errors
    ///
    /// [`TitanError::InvalidAddress`](crate::TitanError::InvalidAddress) for the
    /// first address that fails to decode.
    pub fn build(self) -> Result<SwapQuoteRequest> {
        let swap = SwapParams {
            input_mint: pubkey_from_str(&self.input_mint)?,
            output_mint: pubkey_from_str(&self.output_mint)?,
            amount: self.amount,
            swap_mode: Some(self.swap_mode),
            slippage_bps: Some(self.slippage_bps),
            only_direct_routes: self.only_direct_routes.then_some(true),
            dexes: non_empty(self.dexes),
            exclude_dexes: non_empty(self.exclude_dexes),
        };

        let transaction = TransactionParams {
            user_public_key: pubkey_from_str(&self.user_public_key)?,
            close_input_token_account: None,
            create_output_token_account: None,
            fee_account: None,
            fee_bps: None,
        };

        let update = self
            .num_quotes
            .filter(|n| *n > 0)
            .map(|num_quotes| QuoteUpdateParams {
                interval_ms: Some(self.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS)),
                num_quotes: Some(num_quotes),
            });

        Ok(SwapQuoteRequest {
            swap,
            transaction,
            update,
        })
    }
}

fn non_empty(list: Vec<String>) -> Option<Vec<String>> {
    (!list.is_empty()).then_some(list)
}
