// New-listing detection: polls the exchange catalogue and diffs it against memory
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

use crate::api::BinanceClient;
use crate::market::InstrumentCatalogue;
use crate::models::{Instrument, ListingRecord};
use crate::Result;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(120);

/// Invoked with each non-empty batch of newly discovered instruments
pub type NewListingCallback = Arc<dyn Fn(Vec<Instrument>) + Send + Sync>;

/// Which classification rule a refresh applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// First run: new means the onboard date is still in the future
    Startup,
    /// Later runs: new means the symbol was not in the catalogue before
    Periodic,
}

/// Everything guarded by the monitor's single lock
#[derive(Debug, Default)]
pub struct MonitorState {
    pub catalogue: InstrumentCatalogue,
    pub listings: HashMap<String, ListingRecord>,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl MonitorState {
    /// Diff one catalogue snapshot into the state and return the instruments
    /// classified as new.
    ///
    /// Only TRADING / PENDING_TRADING instruments are classified; every
    /// instrument is merged into the catalogue regardless of status.
    pub fn apply_snapshot(
        &mut self,
        instruments: Vec<Instrument>,
        kind: RefreshKind,
        now: DateTime<Utc>,
    ) -> Vec<Instrument> {
        let now_ms = now.timestamp_millis();
        let mut discovered = Vec::new();

        for instrument in instruments {
            if instrument.status.is_listable() {
                let is_new = match kind {
                    RefreshKind::Startup => instrument.onboard_date > now_ms,
                    RefreshKind::Periodic => !self.catalogue.contains(&instrument.symbol),
                };

                if is_new {
                    self.listings
                        .entry(instrument.symbol.clone())
                        .or_insert_with(|| ListingRecord::new(&instrument, now));
                    discovered.push(instrument.clone());
                }
            }

            self.catalogue.upsert(instrument);
        }

        self.last_refresh = Some(now);
        discovered
    }
}

/// Counters reported by the status endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorCounts {
    pub instrument_count: usize,
    pub listing_count: usize,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Polls the exchange and owns the catalogue + listing table.
///
/// Network I/O always happens before the write lock is taken; the lock only
/// covers the in-memory diff and merge.
pub struct ListingMonitor {
    client: BinanceClient,
    state: RwLock<MonitorState>,
    on_new: Option<NewListingCallback>,
    poll_interval: Duration,
}

impl ListingMonitor {
    pub fn new(client: BinanceClient) -> Self {
        Self {
            client,
            state: RwLock::new(MonitorState::default()),
            on_new: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_new_listing_callback(mut self, callback: NewListingCallback) -> Self {
        self.on_new = Some(callback);
        self
    }

    pub fn client(&self) -> &BinanceClient {
        &self.client
    }

    /// Run the startup refresh, then poll in the background until `cancel` fires.
    ///
    /// A failing startup refresh is returned to the caller and nothing is
    /// spawned. Failures of later refreshes are logged and polling continues.
    pub async fn start(self: &Arc<Self>, cancel: CancellationToken) -> Result<JoinHandle<()>> {
        tracing::info!("🔍 Starting listing monitor...");
        self.refresh(RefreshKind::Startup).await?;

        let monitor = Arc::clone(self);
        let span = tracing::info_span!("listing_monitor");
        let handle = tokio::spawn(
            async move {
                let mut ticker = interval_at(
                    Instant::now() + monitor.poll_interval,
                    monitor.poll_interval,
                );
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::info!("Listing monitor stopped");
                            break;
                        }
                        _ = ticker.tick() => {
                            if let Err(e) = monitor.refresh(RefreshKind::Periodic).await {
                                tracing::error!("Catalogue refresh failed: {}", e);
                            }
                        }
                    }
                }
            }
            .instrument(span),
        );

        tracing::info!(
            "✅ Listing monitor running (every {}s)",
            self.poll_interval.as_secs()
        );
        Ok(handle)
    }

    /// Fetch the catalogue once and merge it. Returns the newly discovered batch.
    pub async fn refresh(&self, kind: RefreshKind) -> Result<Vec<Instrument>> {
        let instruments = self.client.fetch_catalogue().await?;

        let (discovered, total, listings) = {
            let mut state = self.state.write().await;
            let discovered = state.apply_snapshot(instruments, kind, Utc::now());
            (discovered, state.catalogue.len(), state.listings.len())
        };

        for instrument in &discovered {
            tracing::info!(
                symbol = %instrument.symbol,
                onboard_date = instrument.onboard_date,
                status = instrument.status.as_str(),
                "🆕 New listing detected"
            );
        }
        tracing::info!(
            "Catalogue refreshed ({:?}): {} instruments, {} listings, {} new",
            kind,
            total,
            listings,
            discovered.len()
        );

        if !discovered.is_empty() {
            if let Some(callback) = &self.on_new {
                callback(discovered.clone());
            }
        }

        Ok(discovered)
    }

    // ========================================================================
    // Listing table
    // ========================================================================

    /// Register a listing by hand. Returns false if the symbol is already tracked.
    ///
    /// Unknown symbols also get a placeholder catalogue entry (status TRADING,
    /// no filters) until the next refresh brings the real one.
    pub async fn add_listing(&self, symbol: &str, onboard_date: i64) -> bool {
        let mut state = self.state.write().await;
        if state.listings.contains_key(symbol) {
            return false;
        }

        let placeholder = Instrument::placeholder(symbol, onboard_date);
        let record = ListingRecord::new(&placeholder, Utc::now());
        state.catalogue.insert_if_absent(placeholder);
        state.listings.insert(symbol.to_string(), record);

        tracing::info!(symbol = %symbol, "➕ Listing added manually");
        true
    }

    pub async fn get_listing(&self, symbol: &str) -> Option<ListingRecord> {
        self.state.read().await.listings.get(symbol).cloned()
    }

    /// All listing records, sorted by symbol
    pub async fn listings(&self) -> Vec<ListingRecord> {
        let state = self.state.read().await;
        let mut all: Vec<ListingRecord> = state.listings.values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    pub async fn unordered_listings(&self) -> Vec<ListingRecord> {
        self.listings()
            .await
            .into_iter()
            .filter(|l| !l.ordered)
            .collect()
    }

    /// discovered -> ordered. False if the listing is unknown or already ordered.
    pub async fn mark_ordered(&self, symbol: &str) -> bool {
        let mut state = self.state.write().await;
        match state.listings.get_mut(symbol) {
            Some(record) => record.mark_ordered(Utc::now()),
            None => false,
        }
    }

    // ========================================================================
    // Catalogue
    // ========================================================================

    pub async fn get_instrument(&self, symbol: &str) -> Option<Instrument> {
        self.state.read().await.catalogue.get(symbol).cloned()
    }

    pub async fn instruments(&self) -> Vec<Instrument> {
        self.state.read().await.catalogue.snapshot()
    }

    /// Merge a single instrument fetched outside the polling cycle
    pub async fn upsert_instrument(&self, instrument: Instrument) {
        self.state.write().await.catalogue.upsert(instrument);
    }

    pub async fn counts(&self) -> MonitorCounts {
        let state = self.state.read().await;
        MonitorCounts {
            instrument_count: state.catalogue.len(),
            listing_count: state.listings.len(),
            last_refresh: state.last_refresh,
        }
    }

    pub async fn last_refresh_time(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_refresh
    }
}
