//! Server Info - connect and print the server's version and limits.
//!
//! ```text
//! TITAN_WS_URL=wss://fra.api.titan-sol.tech/api/v1/ws \
//! TITAN_AUTH_TOKEN=... \
//! RUST_LOG=titan_native_client=debug \
//!     cargo run --example server_info
//! ```

use titan_native_client::ClientConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = ClientConfig::from_env()?.connect().await?;
    println!(
        "Connected via {} (compression: {})",
        client.protocol(),
        client.compression()
    );

    let info = client.get_info().await?;
    let settings = &info.settings;
    println!("Protocol version: {}", info.protocol_version);
    println!(
        "Quote interval:   {}..={} ms (default {})",
        settings.quote_update.interval_ms.min,
        settings.quote_update.interval_ms.max,
        settings.quote_update.interval_ms.default
    );
    println!(
        "Quotes per update: {}..={} (default {})",
        settings.quote_update.num_quotes.min,
        settings.quote_update.num_quotes.max,
        settings.quote_update.num_quotes.default
    );
    println!(
        "Slippage:         {}..={} bps (default {})",
        settings.swap.slippage_bps.min,
        settings.swap.slippage_bps.max,
        settings.swap.slippage_bps.default
    );
    println!(
        "Concurrent streams: {}",
        settings.connection.concurrent_streams
    );

    client.close().await?;
    Ok(())
}
