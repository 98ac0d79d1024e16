//! Event Log - record protocol events in a `LogStore` and dump them as JSON lines.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use titan_native_client::{ClientConfig, LogFilter, LogStore, SwapQuoteRequestBuilder};
use tracing_subscriber::EnvFilter;

const SOL: &str = "So11111111111111111111111111111111111111112";
const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_env()?;
    let store = Arc::new(LogStore::new());
    let client = config
        .builder()
        .event_sink(store.clone())
        .connect(&config.url)
        .await?;

    client.get_info().await?;

    if let Ok(user) = std::env::var("TITAN_USER_PUBKEY") {
        let request = SwapQuoteRequestBuilder::new(SOL, USDC, 100_000_000, user).build()?;
        let (_, quotes) = client.new_swap_quote_stream(&request).await?;

        // A few seconds of updates, then drop the stream.
        let mut limited = quotes.take_until(Box::pin(tokio::time::sleep(Duration::from_secs(3))));
        while let Some(update) = limited.next().await {
            if let Err(e) = update {
                eprintln!("stream error: {}", e);
            }
        }
    }

    client.close().await?;

    print!("{}", store.to_json_lines()?);
    eprintln!(
        "{} events, {} errors",
        store.len(),
        store.filtered(LogFilter::Errors).len()
    );
    Ok(())
}
