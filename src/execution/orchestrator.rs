// Short entry + stop-loss / take-profit bracket placement
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::Instrument as _;

use crate::api::BinanceClient;
use crate::config::{AccountMode, BracketLegSettings, TradingSettings};
use crate::discovery::ListingMonitor;
use crate::error::ExchangeError;
use crate::market::{adjust_price, adjust_quantity};
use crate::models::{
    Instrument, OrderIntent, OrderKind, OrderResult, OrderSet, OrderSize, Side,
};
use crate::Result;

/// Entry is always a short
const ENTRY_SIDE: Side = Side::Sell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BracketLeg {
    StopLoss,
    TakeProfit,
}

impl BracketLeg {
    fn name(&self) -> &'static str {
        match self {
            BracketLeg::StopLoss => "stop-loss",
            BracketLeg::TakeProfit => "take-profit",
        }
    }

    fn kind(&self) -> OrderKind {
        match self {
            BracketLeg::StopLoss => OrderKind::StopMarket,
            BracketLeg::TakeProfit => OrderKind::TakeProfitMarket,
        }
    }
}

/// How bracket legs are sized for the current account mode
#[derive(Debug, Clone, PartialEq, Eq)]
enum LegSizing {
    /// Dedicated mode: close whatever position is open
    ClosePosition,
    /// Unified mode: explicit quantity on a conditional order
    Quantity(String),
    /// Unified mode, but no usable quantity could be derived
    Unavailable(String),
}

/// Stop-loss trigger for a short: a rise of `percent` over the entry
pub fn stop_loss_trigger(entry_price: Decimal, percent: Decimal) -> Decimal {
    entry_price * (Decimal::ONE + percent / Decimal::ONE_HUNDRED)
}

/// Take-profit trigger for a short: a drop of `percent` under the entry
pub fn take_profit_trigger(entry_price: Decimal, percent: Decimal) -> Decimal {
    entry_price * (Decimal::ONE - percent / Decimal::ONE_HUNDRED)
}

/// Filled size of the entry, trying in order: executedQty, origQty,
/// cumQuote / price, notional / price. Absolute value, never zero.
pub fn resolve_filled_quantity(
    entry: &OrderResult,
    entry_price: Decimal,
    notional: Decimal,
) -> Option<Decimal> {
    let non_zero = |v: Option<Decimal>| v.map(|d| d.abs()).filter(|d| !d.is_zero());
    let per_price = |quote: Option<Decimal>| {
        non_zero(quote).and_then(|q| {
            if entry_price > Decimal::ZERO {
                q.checked_div(entry_price)
            } else {
                None
            }
        })
    };

    non_zero(entry.executed_qty)
        .or_else(|| non_zero(entry.orig_qty))
        .or_else(|| per_price(entry.cum_quote))
        .or_else(|| per_price(Some(notional)))
        .filter(|q| !q.is_zero())
}

fn parse_notional(text: &str) -> Result<Decimal> {
    let notional = Decimal::from_str(text.trim())
        .map_err(|_| ExchangeError::validation(format!("invalid notional amount: {:?}", text)))?;
    if notional <= Decimal::ZERO {
        return Err(ExchangeError::validation(format!(
            "notional amount must be positive, got {}",
            text
        )));
    }
    Ok(notional)
}

fn is_positive(text: &str) -> bool {
    Decimal::from_str(text).is_ok_and(|d| d > Decimal::ZERO)
}

/// Places one short entry and its bracket legs for a symbol.
///
/// The entry is load-bearing: its failure aborts everything. After a
/// successful entry each bracket leg is attempted independently and its
/// outcome is recorded on the returned [`OrderSet`].
pub struct OrderOrchestrator {
    client: BinanceClient,
    monitor: Arc<ListingMonitor>,
    settings: TradingSettings,
}

impl OrderOrchestrator {
    pub fn new(client: BinanceClient, monitor: Arc<ListingMonitor>, settings: TradingSettings) -> Self {
        Self {
            client,
            monitor,
            settings,
        }
    }

    pub fn settings(&self) -> &TradingSettings {
        &self.settings
    }

    /// Open a short on `symbol` sized by `notional` (or the configured default)
    /// and bracket it.
    pub async fn place(&self, symbol: &str, notional: Option<&str>) -> Result<OrderSet> {
        let span = tracing::info_span!("place_bracket", symbol = %symbol);
        self.place_inner(symbol, notional).instrument(span).await
    }

    async fn place_inner(&self, symbol: &str, notional: Option<&str>) -> Result<OrderSet> {
        let notional_text = notional
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(self.settings.default_notional.as_str())
            .to_string();
        let notional = parse_notional(&notional_text)?;
        let mode = self.client.account_mode();

        let instrument = self.resolve_instrument(symbol).await?;

        // 1. Entry
        let size = match mode {
            AccountMode::Dedicated => OrderSize::Notional(notional_text.clone()),
            AccountMode::Unified => {
                let price = self.positive_price(symbol).await?;
                let quantity = notional.checked_div(price).ok_or_else(|| {
                    ExchangeError::validation(format!("cannot size {} at price {}", symbol, price))
                })?;
                let text = adjust_quantity(quantity, &instrument.quantity_rule())?;
                if !is_positive(&text) {
                    return Err(ExchangeError::validation(format!(
                        "notional {} buys less than one quantity step of {} at price {} (adjusted quantity {})",
                        notional_text, symbol, price, text
                    )));
                }
                OrderSize::Quantity(text)
            }
        };

        tracing::info!(
            "📉 Opening short: notional {} ({:?} mode, {:?})",
            notional_text,
            mode,
            size
        );

        let intent = OrderIntent::market(symbol, ENTRY_SIDE, size, self.settings.position_side);
        let entry = match self.client.submit_order(&intent).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!("❌ Entry order failed: {}", e);
                return Err(e);
            }
        };
        tracing::info!(
            order_id = entry.order_id,
            "✅ Entry order placed (status {}, executed {:?})",
            entry.status,
            entry.executed_qty
        );
        // A position is open from here on, whatever happens to the legs
        self.monitor.mark_ordered(symbol).await;

        // 2. Entry price
        let entry_price = self.resolve_entry_price(symbol, &entry).await?;

        // 3. Leg sizing
        let sizing = match mode {
            AccountMode::Dedicated => LegSizing::ClosePosition,
            AccountMode::Unified => self.leg_quantity(&instrument, &entry, entry_price, notional),
        };

        // 4. Legs, each best-effort
        let stop_loss = self
            .place_leg_if_enabled(BracketLeg::StopLoss, &instrument, entry_price, &sizing)
            .await;
        let take_profit = self
            .place_leg_if_enabled(BracketLeg::TakeProfit, &instrument, entry_price, &sizing)
            .await;

        Ok(OrderSet {
            symbol: symbol.to_string(),
            entry,
            stop_loss,
            take_profit,
        })
    }

    /// Catalogue entry with filters, refreshing from the exchange if we only
    /// hold a placeholder. Runs before the entry in both modes: no position is
    /// opened without the tick rule its legs are priced with.
    async fn resolve_instrument(&self, symbol: &str) -> Result<Instrument> {
        if let Some(instrument) = self.monitor.get_instrument(symbol).await {
            if instrument.has_rules() {
                return Ok(instrument);
            }
        }

        tracing::debug!("No filters cached for {}, fetching exchange info", symbol);
        let instrument = self
            .client
            .fetch_catalogue()
            .await?
            .into_iter()
            .find(|i| i.symbol == symbol)
            .ok_or_else(|| ExchangeError::validation(format!("unknown symbol {}", symbol)))?;

        self.monitor.upsert_instrument(instrument.clone()).await;
        Ok(instrument)
    }

    async fn positive_price(&self, symbol: &str) -> Result<Decimal> {
        let price = self.client.fetch_price(symbol).await?;
        if price <= Decimal::ZERO {
            return Err(ExchangeError::validation(format!(
                "non-positive price {} for {}",
                price, symbol
            )));
        }
        Ok(price)
    }

    /// avgPrice from the fill, otherwise the current ticker price
    async fn resolve_entry_price(&self, symbol: &str, entry: &OrderResult) -> Result<Decimal> {
        if let Some(avg) = entry.avg_price.filter(|p| *p > Decimal::ZERO) {
            return Ok(avg);
        }

        tracing::warn!("Entry response has no average price, falling back to ticker");
        self.positive_price(symbol).await.map_err(|e| {
            ExchangeError::validation(format!(
                "could not resolve entry price for {} (entry order {} is open): {}",
                symbol, entry.order_id, e
            ))
        })
    }

    fn leg_quantity(
        &self,
        instrument: &Instrument,
        entry: &OrderResult,
        entry_price: Decimal,
        notional: Decimal,
    ) -> LegSizing {
        let Some(quantity) = resolve_filled_quantity(entry, entry_price, notional) else {
            return LegSizing::Unavailable("no filled quantity could be derived".to_string());
        };

        match adjust_quantity(quantity, &instrument.quantity_rule()) {
            Ok(text) if is_positive(&text) => LegSizing::Quantity(text),
            Ok(text) => LegSizing::Unavailable(format!("adjusted quantity {} is not positive", text)),
            Err(e) => LegSizing::Unavailable(e.to_string()),
        }
    }

    fn leg_settings(&self, leg: BracketLeg) -> &BracketLegSettings {
        match leg {
            BracketLeg::StopLoss => &self.settings.stop_loss,
            BracketLeg::TakeProfit => &self.settings.take_profit,
        }
    }

    async fn place_leg_if_enabled(
        &self,
        leg: BracketLeg,
        instrument: &Instrument,
        entry_price: Decimal,
        sizing: &LegSizing,
    ) -> Option<Result<OrderResult>> {
        if !self.leg_settings(leg).enabled {
            return None;
        }

        let result = self.place_leg(leg, instrument, entry_price, sizing).await;
        match &result {
            Ok(order) => tracing::info!(
                order_id = order.order_id,
                "✅ {} placed at {:?}",
                leg.name(),
                order.stop_price
            ),
            Err(e) => tracing::error!("❌ {} failed: {}", leg.name(), e),
        }
        Some(result)
    }

    async fn place_leg(
        &self,
        leg: BracketLeg,
        instrument: &Instrument,
        entry_price: Decimal,
        sizing: &LegSizing,
    ) -> Result<OrderResult> {
        let settings = self.leg_settings(leg);
        let raw = match leg {
            BracketLeg::StopLoss => stop_loss_trigger(entry_price, settings.percent),
            BracketLeg::TakeProfit => take_profit_trigger(entry_price, settings.percent),
        };
        let stop_price = adjust_price(raw, &instrument.price_rule())?;

        let (size, conditional) = match sizing {
            LegSizing::ClosePosition => (OrderSize::ClosePosition, false),
            LegSizing::Quantity(q) => (OrderSize::Quantity(q.clone()), true),
            LegSizing::Unavailable(reason) => {
                return Err(ExchangeError::validation(format!(
                    "{} not placed, unified account needs a quantity: {}",
                    leg.name(),
                    reason
                )));
            }
        };

        let intent = OrderIntent::trigger(
            &instrument.symbol,
            ENTRY_SIDE.opposite(),
            leg.kind(),
            size,
            stop_price,
            self.settings.position_side,
            settings.working_type,
        );

        if conditional {
            self.client.submit_conditional_order(&intent).await
        } else {
            self.client.submit_order(&intent).await
        }
    }
}
