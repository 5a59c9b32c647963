// Facade the HTTP layer and the auto-trader call into
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::BinanceClient;
use crate::config::TradingSettings;
use crate::discovery::{ListingMonitor, NewListingCallback};
use crate::error::ExchangeError;
use crate::execution::{OrderOrchestrator, PlacementGuards};
use crate::models::{Instrument, ListingRecord, OrderSet};
use crate::Result;

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub instrument_count: usize,
    pub listing_count: usize,
    pub last_refresh_time: Option<DateTime<Utc>>,
    pub trading_enabled: bool,
}

pub struct TradingEngine {
    monitor: Arc<ListingMonitor>,
    /// `None` when no API credentials are configured
    orchestrator: Option<OrderOrchestrator>,
    guards: PlacementGuards,
}

impl TradingEngine {
    pub fn new(monitor: Arc<ListingMonitor>, orchestrator: Option<OrderOrchestrator>) -> Self {
        Self {
            monitor,
            orchestrator,
            guards: PlacementGuards::new(),
        }
    }

    /// Trading is enabled only if `client` carries credentials
    pub fn from_client(client: BinanceClient, monitor: Arc<ListingMonitor>, settings: TradingSettings) -> Self {
        let orchestrator = client
            .has_credentials()
            .then(|| OrderOrchestrator::new(client, Arc::clone(&monitor), settings));
        if orchestrator.is_none() {
            tracing::warn!("⚠️  API credentials not configured, trading disabled (monitor only)");
        }
        Self::new(monitor, orchestrator)
    }

    pub fn trading_enabled(&self) -> bool {
        self.orchestrator.is_some()
    }

    pub fn monitor(&self) -> &Arc<ListingMonitor> {
        &self.monitor
    }

    /// Short `symbol` with a stop-loss / take-profit bracket, at most once per symbol.
    pub async fn place_bracket_order(&self, symbol: &str, notional: Option<&str>) -> Result<OrderSet> {
        let orchestrator = self.orchestrator.as_ref().ok_or_else(|| {
            ExchangeError::validation("trading is disabled: API credentials are not configured")
        })?;

        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ExchangeError::validation("symbol is required"));
        }

        if !self.monitor.add_listing(&symbol, Utc::now().timestamp_millis()).await {
            tracing::debug!(symbol = %symbol, "Listing already tracked");
        }

        let _guard = self.guards.try_acquire(&symbol).ok_or_else(|| {
            ExchangeError::validation(format!("placement already in progress for {}", symbol))
        })?;

        if let Some(listing) = self.monitor.get_listing(&symbol).await {
            if listing.ordered {
                return Err(ExchangeError::validation(format!("{} already ordered", symbol)));
            }
        }

        // The orchestrator marks the listing ordered once the entry is accepted
        tracing::info!(symbol = %symbol, "🚀 Placing bracket order");
        orchestrator.place(&symbol, notional).await
    }

    pub async fn status(&self) -> EngineStatus {
        let counts = self.monitor.counts().await;
        EngineStatus {
            instrument_count: counts.instrument_count,
            listing_count: counts.listing_count,
            last_refresh_time: counts.last_refresh,
            trading_enabled: self.trading_enabled(),
        }
    }

    pub async fn list_listings(&self) -> Vec<ListingRecord> {
        self.monitor.listings().await
    }

    pub async fn list_instruments(&self) -> Vec<Instrument> {
        self.monitor.instruments().await
    }
}

// ============================================================================
// Auto-trading
// ============================================================================

/// Discovery callback forwarding each batch to the auto-trader task
pub fn auto_trade_callback(tx: mpsc::UnboundedSender<Vec<Instrument>>) -> NewListingCallback {
    Arc::new(move |batch: Vec<Instrument>| {
        if tx.send(batch).is_err() {
            tracing::warn!("Auto-trader is gone, dropping discovered batch");
        }
    })
}

/// Place bracket orders with the default notional for every discovered symbol
pub fn spawn_auto_trader(
    engine: Arc<TradingEngine>,
    mut rx: mpsc::UnboundedReceiver<Vec<Instrument>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                batch = rx.recv() => match batch {
                    Some(batch) => batch,
                    None => break,
                },
            };

            for instrument in batch {
                match engine.place_bracket_order(&instrument.symbol, None).await {
                    Ok(set) => tracing::info!(
                        symbol = %instrument.symbol,
                        entry_order_id = set.entry.order_id,
                        "🤖 Auto-trade placed"
                    ),
                    Err(e) => tracing::error!(
                        symbol = %instrument.symbol,
                        "🤖 Auto-trade failed: {}",
                        e
                    ),
                }
            }
        }
        tracing::info!("Auto-trader stopped");
    })
}
