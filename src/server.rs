// HTTP API over the trading engine

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::engine::TradingEngine;
use crate::models::{Instrument, ListingRecord, OrderResult, OrderSet};

#[derive(Debug, Default, Deserialize)]
pub struct SimulateListingRequest {
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    /// Quote amount; the configured default when absent
    #[serde(default)]
    pub notional_usdt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderSetView {
    pub symbol: String,
    pub entry_order: OrderResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_order: Option<OrderResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit_order: Option<OrderResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit_error: Option<String>,
}

fn split_leg(leg: Option<crate::Result<OrderResult>>) -> (Option<OrderResult>, Option<String>) {
    match leg {
        Some(Ok(order)) => (Some(order), None),
        Some(Err(e)) => (None, Some(e.to_string())),
        None => (None, None),
    }
}

impl From<OrderSet> for OrderSetView {
    fn from(set: OrderSet) -> Self {
        let (stop_loss_order, stop_loss_error) = split_leg(set.stop_loss);
        let (take_profit_order, take_profit_error) = split_leg(set.take_profit);
        Self {
            symbol: set.symbol,
            entry_order: set.entry,
            stop_loss_order,
            take_profit_order,
            stop_loss_error,
            take_profit_error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_set: Option<OrderSetView>,
}

#[derive(Debug, Serialize)]
pub struct SimulateListingResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_set: Option<OrderSetView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<SymbolOutcome>,
}

impl SimulateListingResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            symbol: None,
            order_set: None,
            results: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub symbol_count: usize,
    pub new_listing_count: usize,
    pub last_update_time: Option<DateTime<Utc>>,
    pub trading_enabled: bool,
}

/// Create the axum router.
pub fn create_router(engine: Arc<TradingEngine>) -> Router {
    Router::new()
        .route("/api/simulate/new-listing", post(simulate_new_listing))
        .route("/api/status", get(get_status))
        .route("/api/new-listings", get(get_new_listings))
        .route("/api/symbols", get(get_symbols))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

/// Serve until `cancel` fires.
pub async fn serve(engine: Arc<TradingEngine>, port: u16, cancel: CancellationToken) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("🌐 HTTP server listening on {}", addr);
    tracing::info!("  POST /api/simulate/new-listing - trigger bracket orders");
    tracing::info!("  GET  /api/status | /api/new-listings | /api/symbols | /health");

    axum::serve(listener, create_router(engine))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_status(State(engine): State<Arc<TradingEngine>>) -> Json<StatusResponse> {
    let status = engine.status().await;
    Json(StatusResponse {
        symbol_count: status.instrument_count,
        new_listing_count: status.listing_count,
        last_update_time: status.last_refresh_time,
        trading_enabled: status.trading_enabled,
    })
}

async fn get_new_listings(
    State(engine): State<Arc<TradingEngine>>,
) -> Json<BTreeMap<String, ListingRecord>> {
    let listings = engine.list_listings().await;
    Json(listings.into_iter().map(|l| (l.symbol.clone(), l)).collect())
}

async fn get_symbols(State(engine): State<Arc<TradingEngine>>) -> Json<BTreeMap<String, Instrument>> {
    let instruments = engine.list_instruments().await;
    Json(instruments.into_iter().map(|i| (i.symbol.clone(), i)).collect())
}

async fn simulate_new_listing(
    State(engine): State<Arc<TradingEngine>>,
    payload: Result<Json<SimulateListingRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(SimulateListingResponse::failure(format!(
                    "invalid request body: {}",
                    rejection.body_text()
                ))),
            )
                .into_response();
        }
    };

    let symbols: Vec<String> = if !request.symbols.is_empty() {
        request.symbols
    } else {
        request.symbol.into_iter().collect()
    };
    if symbols.iter().all(|s| s.trim().is_empty()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(SimulateListingResponse::failure(
                "provide a list of symbols (symbols) or a single symbol (symbol)",
            )),
        )
            .into_response();
    }

    if !engine.trading_enabled() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SimulateListingResponse::failure(
                "trading is disabled, configure the API key and secret",
            )),
        )
            .into_response();
    }

    let notional = request.notional_usdt.as_deref();

    if symbols.len() == 1 {
        let outcome = process_symbol(&engine, &symbols[0], notional).await;
        let status = if outcome.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let response = SimulateListingResponse {
            success: outcome.success,
            message: outcome.message,
            symbol: Some(outcome.symbol),
            order_set: outcome.order_set,
            results: Vec::new(),
        };
        return (status, Json(response)).into_response();
    }

    tracing::info!("Batch trigger for {} symbols", symbols.len());
    let mut results = Vec::with_capacity(symbols.len());
    for symbol in symbols.iter().filter(|s| !s.trim().is_empty()) {
        results.push(process_symbol(&engine, symbol, notional).await);
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    let response = SimulateListingResponse {
        success: succeeded > 0,
        message: format!("batch complete: {}/{} succeeded", succeeded, results.len()),
        symbol: None,
        order_set: None,
        results,
    };
    (StatusCode::OK, Json(response)).into_response()
}

async fn process_symbol(engine: &TradingEngine, symbol: &str, notional: Option<&str>) -> SymbolOutcome {
    let symbol = symbol.trim().to_uppercase();
    match engine.place_bracket_order(&symbol, notional).await {
        Ok(set) => {
            let view = OrderSetView::from(set);
            let message = match (&view.stop_loss_error, &view.take_profit_error) {
                (None, None) => format!("orders placed for {}", symbol),
                _ => format!("entry placed for {}, some bracket legs failed", symbol),
            };
            SymbolOutcome {
                symbol,
                success: true,
                message,
                order_set: Some(view),
            }
        }
        Err(e) => {
            tracing::error!(symbol = %symbol, "Trigger failed: {}", e);
            SymbolOutcome {
                symbol,
                success: false,
                message: format!("placement failed: {}", e),
                order_set: None,
            }
        }
    }
}
