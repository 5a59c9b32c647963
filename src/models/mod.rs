use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ExchangeError;
use crate::market::StepRule;

/// Trading status reported by the exchange catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum InstrumentStatus {
    Trading,
    PendingTrading,
    Other(String),
}

impl InstrumentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            InstrumentStatus::Trading => "TRADING",
            InstrumentStatus::PendingTrading => "PENDING_TRADING",
            InstrumentStatus::Other(s) => s,
        }
    }

    /// Only these statuses take part in new-listing detection
    pub fn is_listable(&self) -> bool {
        matches!(
            self,
            InstrumentStatus::Trading | InstrumentStatus::PendingTrading
        )
    }
}

impl From<&str> for InstrumentStatus {
    fn from(s: &str) -> Self {
        match s {
            "TRADING" => InstrumentStatus::Trading,
            "PENDING_TRADING" => InstrumentStatus::PendingTrading,
            other => InstrumentStatus::Other(other.to_string()),
        }
    }
}

impl From<InstrumentStatus> for String {
    fn from(status: InstrumentStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A futures symbol and the rounding rules the exchange enforces on it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instrument {
    pub symbol: String,
    /// Epoch milliseconds; may lie in the future for announced listings
    pub onboard_date: i64,
    pub status: InstrumentStatus,
    /// LOT_SIZE filter
    pub quantity_rule: Option<StepRule>,
    /// PRICE_FILTER filter
    pub price_rule: Option<StepRule>,
}

impl Instrument {
    /// Placeholder for a symbol registered by hand before the catalogue knows it
    pub fn placeholder(symbol: &str, onboard_date: i64) -> Self {
        Self {
            symbol: symbol.to_string(),
            onboard_date,
            status: InstrumentStatus::Trading,
            quantity_rule: None,
            price_rule: None,
        }
    }

    /// True when at least one exchange filter has been loaded for this symbol
    pub fn has_rules(&self) -> bool {
        self.quantity_rule.is_some() || self.price_rule.is_some()
    }

    pub fn quantity_rule(&self) -> StepRule {
        self.quantity_rule.clone().unwrap_or_default()
    }

    pub fn price_rule(&self) -> StepRule {
        self.price_rule.clone().unwrap_or_default()
    }
}

/// A symbol classified as newly listed, and whether we already traded it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRecord {
    pub symbol: String,
    pub onboard_date: i64,
    pub status: InstrumentStatus,
    pub found_time: DateTime<Utc>,
    pub ordered: bool,
    pub order_time: Option<DateTime<Utc>>,
}

impl ListingRecord {
    pub fn new(instrument: &Instrument, found_time: DateTime<Utc>) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            onboard_date: instrument.onboard_date,
            status: instrument.status.clone(),
            found_time,
            ordered: false,
            order_time: None,
        }
    }

    /// discovered -> ordered, exactly once
    pub fn mark_ordered(&mut self, at: DateTime<Utc>) -> bool {
        if self.ordered {
            return false;
        }
        self.ordered = true;
        self.order_time = Some(at);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Market,
    StopMarket,
    TakeProfitMarket,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "MARKET",
            OrderKind::StopMarket => "STOP_MARKET",
            OrderKind::TakeProfitMarket => "TAKE_PROFIT_MARKET",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    #[default]
    Both,
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Both => "BOTH",
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }
}

/// Price series a conditional order's trigger is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkingType {
    #[default]
    MarkPrice,
    ContractPrice,
}

impl WorkingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkingType::MarkPrice => "MARK_PRICE",
            WorkingType::ContractPrice => "CONTRACT_PRICE",
        }
    }
}

/// How an order is sized. Exactly one form is sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderSize {
    /// Base-asset quantity, already formatted to the step size
    Quantity(String),
    /// Quote-currency amount (dedicated account mode only)
    Notional(String),
    /// Close whatever position is open on the symbol
    ClosePosition,
}

/// Everything needed to place one order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub size: OrderSize,
    pub price: Option<String>,
    pub stop_price: Option<String>,
    pub reduce_only: bool,
    pub position_side: PositionSide,
    pub working_type: Option<WorkingType>,
    pub price_protect: bool,
    /// Sent as newClientOrderId / newClientStrategyId
    pub client_order_id: String,
}

impl OrderIntent {
    pub fn market(symbol: &str, side: Side, size: OrderSize, position_side: PositionSide) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            kind: OrderKind::Market,
            size,
            price: None,
            stop_price: None,
            reduce_only: false,
            position_side,
            working_type: None,
            price_protect: false,
            client_order_id: new_client_order_id(),
        }
    }

    /// Reduce-only trigger order closing (part of) a position
    pub fn trigger(
        symbol: &str,
        side: Side,
        kind: OrderKind,
        size: OrderSize,
        stop_price: String,
        position_side: PositionSide,
        working_type: WorkingType,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            kind,
            size,
            price: None,
            stop_price: Some(stop_price),
            reduce_only: true,
            position_side,
            working_type: Some(working_type),
            price_protect: true,
            client_order_id: new_client_order_id(),
        }
    }
}

/// Client ids are limited to 36 chars of [.A-Z:/a-z0-9_-]
fn new_client_order_id() -> String {
    format!("lt-{}", uuid::Uuid::new_v4().simple())
        .chars()
        .take(36)
        .collect()
}

/// Normalised answer for both regular and conditional orders
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct OrderResult {
    pub order_id: i64,
    pub client_order_id: String,
    pub symbol: String,
    pub status: String,
    pub side: String,
    pub order_type: String,
    pub avg_price: Option<Decimal>,
    pub orig_qty: Option<Decimal>,
    pub executed_qty: Option<Decimal>,
    pub cum_quote: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time: i64,
    pub update_time: i64,
}

/// Outcome of one bracket trigger: entry, then two independent legs
#[derive(Debug)]
pub struct OrderSet {
    pub symbol: String,
    pub entry: OrderResult,
    /// `None` when the leg is disabled in configuration
    pub stop_loss: Option<Result<OrderResult, ExchangeError>>,
    pub take_profit: Option<Result<OrderResult, ExchangeError>>,
}

impl OrderSet {
    pub fn stop_loss_error(&self) -> Option<&ExchangeError> {
        self.stop_loss.as_ref().and_then(|leg| leg.as_ref().err())
    }

    pub fn take_profit_error(&self) -> Option<&ExchangeError> {
        self.take_profit.as_ref().and_then(|leg| leg.as_ref().err())
    }
}
