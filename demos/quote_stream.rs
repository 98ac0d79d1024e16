//! Quote Stream - open a swap quote stream and print the best quote per update.
//!
//! This example demonstrates:
//! - Building a request with `SwapQuoteRequestBuilder`
//! - Consuming updates from the returned `UpdateStream`
//! - Stopping the stream explicitly
//!
//! ```text
//! TITAN_WS_URL=wss://fra.api.titan-sol.tech/api/v1/ws \
//! TITAN_AUTH_TOKEN=... \
//! TITAN_USER_PUBKEY=<your wallet> \
//!     cargo run --example quote_stream
//! ```

use futures_util::StreamExt;
use titan_native_client::{ClientConfig, SwapQuoteRequestBuilder};
use tracing_subscriber::EnvFilter;

const SOL: &str = "So11111111111111111111111111111111111111112";
const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Updates to print before stopping.
const MAX_UPDATES: usize = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let user = std::env::var("TITAN_USER_PUBKEY")?;
    let config = ClientConfig::from_env()?;
    let client = config
        .builder()
        .on_connection_lost(|| eprintln!("Connection lost"))
        .connect(&config.url)
        .await?;

    let request = SwapQuoteRequestBuilder::new(SOL, USDC, 1_000_000_000, user)
        .slippage_bps(50)
        .interval_ms(1000)
        .num_quotes(3)
        .build()?;

    let (response, mut quotes) = client.new_swap_quote_stream(&request).await?;
    println!(
        "Stream {} open (interval {:?} ms, {:?} quotes)",
        response.id, response.interval_ms, response.num_quotes
    );

    let mut seen = 0;
    while let Some(update) = quotes.next().await {
        let update = update?;
        match update.best_quote() {
            Some((provider, quote)) => println!(
                "[{}] best: {} -> {} via {} ({} providers)",
                update.id,
                quote.in_amount,
                quote.out_amount,
                provider,
                update.quotes.len()
            ),
            None => println!("[{}] no quotes", update.id),
        }

        seen += 1;
        if seen == MAX_UPDATES {
            break;
        }
    }

    if let Err(e) = quotes.stop().await {
        eprintln!("StopStream: {}", e);
    }
    client.close().await?;
    Ok(())
}
