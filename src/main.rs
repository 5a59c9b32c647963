use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use listing_trader::api::{BinanceClient, RetryConfig};
use listing_trader::config::{AppConfig, LogSettings};
use listing_trader::discovery::ListingMonitor;
use listing_trader::engine::{auto_trade_callback, spawn_auto_trader, TradingEngine};
use listing_trader::server;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

/// Futures new-listing monitor and bracket order trader
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// HTTP port, overrides server.port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config))?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    setup_logging(&config.log);
    config.validate().context("invalid configuration")?;

    tracing::info!("🚀 Listing trader v{} starting", env!("CARGO_PKG_VERSION"));
    log_configuration(&config);

    let client = BinanceClient::new(&config.binance, RetryConfig::from(&config.retry))
        .context("failed to create exchange client")?;

    // Auto-trade wiring has to exist before the monitor's first refresh
    let (auto_tx, auto_rx) = if config.trading.auto_trade && config.trading_enabled() {
        let (tx, rx) = mpsc::unbounded_channel();
        (Some(tx), Some(rx))
    } else {
        if config.trading.auto_trade {
            tracing::warn!("auto_trade is on but trading is disabled, ignoring");
        }
        (None, None)
    };

    let mut monitor = ListingMonitor::new(client.clone())
        .with_poll_interval(Duration::from_secs(config.monitor.poll_interval_secs));
    if let Some(tx) = auto_tx {
        monitor = monitor.with_new_listing_callback(auto_trade_callback(tx));
    }
    let monitor = Arc::new(monitor);

    let engine = Arc::new(TradingEngine::from_client(
        client,
        Arc::clone(&monitor),
        config.trading.clone(),
    ));

    let cancel = CancellationToken::new();

    let auto_task = auto_rx.map(|rx| spawn_auto_trader(Arc::clone(&engine), rx, cancel.clone()));
    let monitor_task = monitor
        .start(cancel.clone())
        .await
        .context("initial catalogue refresh failed")?;

    let server_task = {
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        let port = config.server.port;
        tokio::spawn(
            async move {
                if let Err(e) = server::serve(engine, port, cancel).await {
                    tracing::error!("HTTP server failed: {}", e);
                }
            }
            .instrument(tracing::info_span!("http_server", port)),
        )
    };

    tracing::info!("✅ All tasks running. Press Ctrl+C to stop...");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
        }
        result = server_task => {
            tracing::error!("HTTP server exited: {:?}", result);
        }
    }

    cancel.cancel();
    if let Err(e) = monitor_task.await {
        tracing::warn!("Monitor task ended abnormally: {}", e);
    }
    if let Some(task) = auto_task {
        if let Err(e) = task.await {
            tracing::warn!("Auto-trader ended abnormally: {}", e);
        }
    }

    tracing::info!("👋 Listing trader stopped");
    Ok(())
}

fn setup_logging(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn log_configuration(config: &AppConfig) {
    let trading = &config.trading;
    tracing::info!("📊 Configuration:");
    tracing::info!("  Account mode: {:?}", config.binance.account_mode);
    tracing::info!("  Trading enabled: {}", config.trading_enabled());
    tracing::info!("  Default notional: {}", trading.default_notional);
    tracing::info!("  Position side: {}", trading.position_side.as_str());
    tracing::info!(
        "  Stop-loss: {} ({}%, {})",
        if trading.stop_loss.enabled { "on" } else { "off" },
        trading.stop_loss.percent,
        trading.stop_loss.working_type.as_str()
    );
    tracing::info!(
        "  Take-profit: {} ({}%, {})",
        if trading.take_profit.enabled { "on" } else { "off" },
        trading.take_profit.percent,
        trading.take_profit.working_type.as_str()
    );
    tracing::info!("  Auto-trade: {}", trading.auto_trade);
    tracing::info!("  Poll interval: {}s", config.monitor.poll_interval_secs);
}
