// Wire DTOs for the futures REST API and their conversion into domain models
use serde::Deserialize;

use crate::market::precision::parse_decimal;
use crate::market::StepRule;
use crate::models::{Instrument, InstrumentStatus, OrderResult};

/// Response from /fapi/v1/exchangeInfo (only the parts we use)
#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    #[serde(default)]
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub onboard_date: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFilter {
    pub filter_type: String,
    #[serde(default)]
    pub min_qty: String,
    #[serde(default)]
    pub step_size: String,
    #[serde(default)]
    pub min_price: String,
    #[serde(default)]
    pub tick_size: String,
}

impl SymbolInfo {
    fn filter(&self, filter_type: &str) -> Option<&SymbolFilter> {
        self.filters.iter().find(|f| f.filter_type == filter_type)
    }
}

impl From<SymbolInfo> for Instrument {
    fn from(info: SymbolInfo) -> Self {
        let quantity_rule = info
            .filter("LOT_SIZE")
            .and_then(|f| StepRule::parse(&f.step_size, &f.min_qty));
        let price_rule = info
            .filter("PRICE_FILTER")
            .and_then(|f| StepRule::parse(&f.tick_size, &f.min_price));

        Instrument {
            status: InstrumentStatus::from(info.status.as_str()),
            symbol: info.symbol,
            onboard_date: info.onboard_date,
            quantity_rule,
            price_rule,
        }
    }
}

/// Response from /fapi/v1/ticker/price
#[derive(Debug, Deserialize)]
pub struct TickerPrice {
    #[allow(dead_code)]
    pub symbol: String,
    pub price: String,
}

/// Regular order response (`/fapi/v1/order`, `/papi/v1/um/order`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: i64,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub client_order_id: String,
    #[serde(default)]
    pub avg_price: String,
    #[serde(default)]
    pub orig_qty: String,
    #[serde(default)]
    pub executed_qty: String,
    #[serde(default)]
    pub cum_quote: String,
    #[serde(default, rename = "type")]
    pub order_type: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub stop_price: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub update_time: i64,
}

impl From<OrderResponse> for OrderResult {
    fn from(resp: OrderResponse) -> Self {
        OrderResult {
            order_id: resp.order_id,
            client_order_id: resp.client_order_id,
            symbol: resp.symbol,
            status: resp.status,
            side: resp.side,
            order_type: resp.order_type,
            avg_price: parse_decimal(&resp.avg_price),
            orig_qty: parse_decimal(&resp.orig_qty),
            executed_qty: parse_decimal(&resp.executed_qty),
            cum_quote: parse_decimal(&resp.cum_quote),
            stop_price: parse_decimal(&resp.stop_price),
            time: resp.time,
            update_time: resp.update_time,
        }
    }
}

/// Unified-account conditional order response (`/papi/v1/um/conditional/order`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalOrderResponse {
    pub strategy_id: i64,
    #[serde(default)]
    pub new_client_strategy_id: String,
    #[serde(default)]
    pub strategy_status: String,
    #[serde(default)]
    pub strategy_type: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub orig_qty: String,
    #[serde(default)]
    pub stop_price: String,
    #[serde(default)]
    pub book_time: i64,
    #[serde(default)]
    pub update_time: i64,
}

impl From<ConditionalOrderResponse> for OrderResult {
    fn from(resp: ConditionalOrderResponse) -> Self {
        OrderResult {
            order_id: resp.strategy_id,
            client_order_id: resp.new_client_strategy_id,
            symbol: resp.symbol,
            status: resp.strategy_status,
            side: resp.side,
            order_type: resp.strategy_type,
            avg_price: None,
            orig_qty: parse_decimal(&resp.orig_qty),
            executed_qty: None,
            cum_quote: None,
            stop_price: parse_decimal(&resp.stop_price),
            time: resp.book_time,
            update_time: resp.update_time,
        }
    }
}

/// Application error body returned with non-2xx answers
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}
