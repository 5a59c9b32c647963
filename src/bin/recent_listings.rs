use anyhow::{Context, Result};
use clap::Parser;
use listing_trader::api::binance::FUTURES_BASE_URL;
use listing_trader::{BinanceClient, Instrument, InstrumentStatus};
use serde::Serialize;

/// Print the most recently onboarded TRADING futures symbols
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// How many symbols to print
    #[arg(short = 'n', long, default_value_t = 100)]
    count: usize,

    /// Emit a request body for POST /api/simulate/new-listing instead of a list
    #[arg(long)]
    batch: bool,

    /// notional_usdt placed in the batch body
    #[arg(long, default_value = "200")]
    notional: String,

    /// Market data host
    #[arg(long, default_value = FUTURES_BASE_URL)]
    base_url: String,
}

#[derive(Serialize)]
struct BatchRequest {
    symbols: Vec<String>,
    notional_usdt: String,
}

/// TRADING symbols with a known onboard date, newest first
fn most_recent(mut instruments: Vec<Instrument>, count: usize) -> Vec<Instrument> {
    instruments.retain(|i| i.status == InstrumentStatus::Trading && i.onboard_date > 0);
    instruments.sort_by(|a, b| b.onboard_date.cmp(&a.onboard_date));
    instruments.truncate(count);
    instruments
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("listing_trader=warn")
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let client = BinanceClient::public(&args.base_url)?;
    let instruments = client
        .fetch_catalogue()
        .await
        .context("failed to fetch exchange info")?;

    let recent = most_recent(instruments, args.count);

    if args.batch {
        let body = BatchRequest {
            symbols: recent.into_iter().map(|i| i.symbol).collect(),
            notional_usdt: args.notional,
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        for instrument in recent {
            println!("{}", instrument.symbol);
        }
    }

    Ok(())
}
