use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use super::retry::{retry_with_backoff, RetryConfig};
use super::signing::{signed_query, timestamp_ms};
use super::types::{
    ConditionalOrderResponse, ErrorResponse, ExchangeInfo, OrderResponse, TickerPrice,
};
use crate::config::{AccountMode, BinanceSettings};
use crate::error::{ApiFailure, ExchangeError};
use crate::models::{Instrument, OrderIntent, OrderResult, OrderSize};
use crate::Result;

pub const FUTURES_BASE_URL: &str = "https://fapi.binance.com";
pub const PORTFOLIO_BASE_URL: &str = "https://papi.binance.com";

const EXCHANGE_INFO_PATH: &str = "/fapi/v1/exchangeInfo";
const TICKER_PRICE_PATH: &str = "/fapi/v1/ticker/price";
const FUTURES_ORDER_PATH: &str = "/fapi/v1/order";
const PORTFOLIO_ORDER_PATH: &str = "/papi/v1/um/order";
const PORTFOLIO_CONDITIONAL_PATH: &str = "/papi/v1/um/conditional/order";

const API_KEY_HEADER: &str = "X-MBX-APIKEY";
/// Application code Binance uses for "request throttled" answers
pub const THROTTLED_CODE: i64 = -1008;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Clone)]
struct Credentials {
    api_key: String,
    secret_key: String,
}

/// Binance USDⓈ-M futures client (dedicated `/fapi` or unified `/papi` accounts)
///
/// Cloneable; all clones share one rate limiter. Market data always comes
/// from the futures host, orders go to the host of the configured account mode.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    credentials: Option<Credentials>,
    account_mode: AccountMode,
    order_base_url: String,
    market_data_url: String,
    recv_window_ms: u64,
    retry: RetryConfig,
    rate_limiter: Arc<BinanceRateLimiter>,
}

impl BinanceClient {
    /// Create a client from configuration. Missing credentials are allowed
    /// here; authenticated calls fail with a validation error later.
    pub fn new(settings: &BinanceSettings, retry: RetryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| ExchangeError::validation(format!("failed to build HTTP client: {}", e)))?;

        let credentials = settings.has_credentials().then(|| Credentials {
            api_key: settings.api_key.clone(),
            secret_key: settings.secret_key.clone(),
        });

        let order_base_url = if settings.base_url.trim().is_empty() {
            match settings.account_mode {
                AccountMode::Dedicated => FUTURES_BASE_URL.to_string(),
                AccountMode::Unified => PORTFOLIO_BASE_URL.to_string(),
            }
        } else {
            settings.base_url.trim_end_matches('/').to_string()
        };

        let market_data_url = if settings.market_data_url.trim().is_empty() {
            FUTURES_BASE_URL.to_string()
        } else {
            settings.market_data_url.trim_end_matches('/').to_string()
        };

        let rpm = NonZeroU32::new(settings.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            credentials,
            account_mode: settings.account_mode,
            order_base_url,
            market_data_url,
            recv_window_ms: settings.recv_window_ms,
            retry,
            rate_limiter,
        })
    }

    /// Unauthenticated client for catalogue and price queries only
    pub fn public(market_data_url: &str) -> Result<Self> {
        let settings = BinanceSettings {
            market_data_url: market_data_url.to_string(),
            ..BinanceSettings::default()
        };
        Self::new(&settings, RetryConfig::default())
    }

    pub fn account_mode(&self) -> AccountMode {
        self.account_mode
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    // ========================================================================
    // Market data (unauthenticated, always the futures host)
    // ========================================================================

    /// Fetch every instrument the exchange currently lists
    pub async fn fetch_catalogue(&self) -> Result<Vec<Instrument>> {
        let url = format!("{}{}", self.market_data_url, EXCHANGE_INFO_PATH);

        let info: ExchangeInfo = retry_with_backoff(&self.retry, "fetch exchange info", || {
            self.send_public(&url, &[])
        })
        .await?;

        tracing::debug!("Fetched {} instruments from exchange info", info.symbols.len());
        Ok(info.symbols.into_iter().map(Instrument::from).collect())
    }

    /// Latest traded price for `symbol`
    pub async fn fetch_price(&self, symbol: &str) -> Result<Decimal> {
        let url = format!("{}{}", self.market_data_url, TICKER_PRICE_PATH);
        let query = [("symbol", symbol)];

        let ticker: TickerPrice = retry_with_backoff(&self.retry, "fetch ticker price", || {
            self.send_public(&url, &query)
        })
        .await?;

        Decimal::from_str(ticker.price.trim()).map_err(|_| {
            ExchangeError::validation(format!(
                "unparseable price {:?} for {}",
                ticker.price, symbol
            ))
        })
    }

    // ========================================================================
    // Orders (signed)
    // ========================================================================

    /// Place a regular order on the account mode's order endpoint
    pub async fn submit_order(&self, intent: &OrderIntent) -> Result<OrderResult> {
        let params = order_params(intent);
        let path = self.order_path();

        tracing::info!(
            symbol = %intent.symbol,
            client_order_id = %intent.client_order_id,
            "📤 Submitting {} {} order",
            intent.side.as_str(),
            intent.kind.as_str()
        );

        let response: OrderResponse = retry_with_backoff(&self.retry, "submit order", || {
            self.send_signed(Method::POST, path, &params)
        })
        .await
        .inspect_err(|e| log_ambiguous(e, intent))?;

        Ok(response.into())
    }

    /// Place a conditional (strategy) order. Unified accounts only.
    pub async fn submit_conditional_order(&self, intent: &OrderIntent) -> Result<OrderResult> {
        if self.account_mode != AccountMode::Unified {
            return Err(ExchangeError::validation(
                "conditional orders are only available in unified account mode",
            ));
        }
        let params = conditional_params(intent)?;

        tracing::info!(
            symbol = %intent.symbol,
            client_strategy_id = %intent.client_order_id,
            "📤 Submitting conditional {} {} order",
            intent.side.as_str(),
            intent.kind.as_str()
        );

        let response: ConditionalOrderResponse =
            retry_with_backoff(&self.retry, "submit conditional order", || {
                self.send_signed(Method::POST, PORTFOLIO_CONDITIONAL_PATH, &params)
            })
            .await
            .inspect_err(|e| log_ambiguous(e, intent))?;

        Ok(response.into())
    }

    /// Look up an order by exchange id
    pub async fn query_order(&self, symbol: &str, order_id: i64) -> Result<OrderResult> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let path = self.order_path();

        let response: OrderResponse = retry_with_backoff(&self.retry, "query order", || {
            self.send_signed(Method::GET, path, &params)
        })
        .await?;

        Ok(response.into())
    }

    fn order_path(&self) -> &'static str {
        match self.account_mode {
            AccountMode::Dedicated => FUTURES_ORDER_PATH,
            AccountMode::Unified => PORTFOLIO_ORDER_PATH,
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    async fn send_public<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let response = self.client.get(url).query(query).send().await?;
        decode_response(response).await
    }

    /// One signed attempt. Timestamp and signature are rebuilt on every call,
    /// so each retry carries a fresh timestamp.
    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            ExchangeError::validation("API key and secret are required for signed requests")
        })?;

        let mut all = params.to_vec();
        all.push(("recvWindow", self.recv_window_ms.to_string()));
        all.push(("timestamp", timestamp_ms().to_string()));
        let query = signed_query(&all, &credentials.secret_key)?;

        self.rate_limiter.until_ready().await;

        let url = format!("{}{}?{}", self.order_base_url, path, query);
        let response = self
            .client
            .request(method, &url)
            .header(API_KEY_HEADER, &credentials.api_key)
            .send()
            .await?;

        decode_response(response).await
    }
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(classify_http_error(status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        ExchangeError::RejectedExchange(ApiFailure {
            status: status.as_u16(),
            code: 0,
            msg: format!("undecodable response body: {}", e),
        })
    })
}

/// Map a non-2xx answer onto the error taxonomy.
pub fn classify_http_error(status: u16, body: &str) -> ExchangeError {
    let (code, msg) = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => (err.code, err.msg),
        Err(_) => (0, body.trim().to_string()),
    };
    let failure = ApiFailure { status, code, msg };

    match status {
        503 => {
            let msg = failure.msg.to_lowercase();
            if msg.contains("unknown error") {
                ExchangeError::AmbiguousExecution(failure)
            } else if msg.contains("service unavailable")
                || msg.contains("request throttled")
                || failure.code == THROTTLED_CODE
            {
                ExchangeError::RetryableExchange(failure)
            } else {
                ExchangeError::RejectedExchange(failure)
            }
        }
        429 => ExchangeError::RetryableExchange(failure),
        _ => ExchangeError::RejectedExchange(failure),
    }
}

fn log_ambiguous(err: &ExchangeError, intent: &OrderIntent) {
    if let ExchangeError::AmbiguousExecution(_) = err {
        tracing::error!(
            symbol = %intent.symbol,
            client_order_id = %intent.client_order_id,
            "⚠️  Order state unknown, reconcile with query_order before resubmitting: {}",
            err
        );
    }
}

/// Parameters for `/fapi/v1/order` and `/papi/v1/um/order`
fn order_params(intent: &OrderIntent) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("symbol", intent.symbol.clone()),
        ("side", intent.side.as_str().to_string()),
        ("type", intent.kind.as_str().to_string()),
        ("positionSide", intent.position_side.as_str().to_string()),
        ("newClientOrderId", intent.client_order_id.clone()),
        ("newOrderRespType", "RESULT".to_string()),
    ];

    let close_position = matches!(intent.size, OrderSize::ClosePosition);
    match &intent.size {
        OrderSize::Quantity(q) => params.push(("quantity", q.clone())),
        OrderSize::Notional(n) => params.push(("notional", n.clone())),
        OrderSize::ClosePosition => params.push(("closePosition", "true".to_string())),
    }

    push_common(&mut params, intent, !close_position);
    params
}

/// Parameters for `/papi/v1/um/conditional/order`
fn conditional_params(intent: &OrderIntent) -> Result<Vec<(&'static str, String)>> {
    let OrderSize::Quantity(quantity) = &intent.size else {
        return Err(ExchangeError::validation(
            "conditional orders require an explicit quantity",
        ));
    };

    let mut params = vec![
        ("symbol", intent.symbol.clone()),
        ("side", intent.side.as_str().to_string()),
        ("strategyType", intent.kind.as_str().to_string()),
        ("positionSide", intent.position_side.as_str().to_string()),
        ("newClientStrategyId", intent.client_order_id.clone()),
        ("quantity", quantity.clone()),
    ];
    push_common(&mut params, intent, true);
    Ok(params)
}

fn push_common(params: &mut Vec<(&'static str, String)>, intent: &OrderIntent, allow_reduce_only: bool) {
    if let Some(price) = &intent.price {
        params.push(("price", price.clone()));
    }
    if let Some(stop_price) = &intent.stop_price {
        params.push(("stopPrice", stop_price.clone()));
    }
    if intent.reduce_only && allow_reduce_only {
        params.push(("reduceOnly", "true".to_string()));
    }
    if let Some(working_type) = intent.working_type {
        params.push(("workingType", working_type.as_str().to_string()));
    }
    if intent.price_protect {
        params.push(("priceProtect", "TRUE".to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{OrderKind, PositionSide, Side, WorkingType};
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn client(server_url: &str, mode: AccountMode) -> BinanceClient {
        let settings = BinanceSettings {
            api_key: "test-key".to_string(),
            secret_key: "test-secret".to_string(),
            account_mode: mode,
            base_url: server_url.to_string(),
            market_data_url: server_url.to_string(),
            ..BinanceSettings::default()
        };
        BinanceClient::new(&settings, fast_retry()).unwrap()
    }

    fn sell_notional() -> OrderIntent {
        OrderIntent::market(
            "ABCUSDT",
            Side::Sell,
            OrderSize::Notional("100".to_string()),
            PositionSide::Both,
        )
    }

    const FILLED: &str = r#"{"orderId": 7, "symbol": "ABCUSDT", "status": "FILLED",
        "clientOrderId": "lt-x", "avgPrice": "10.00", "origQty": "10", "executedQty": "10",
        "cumQuote": "100", "type": "MARKET", "side": "SELL", "updateTime": 1}"#;

    #[tokio::test]
    async fn test_fetch_catalogue_parses_instruments() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/fapi/v1/exchangeInfo")
            .with_status(200)
            .with_body(
                r#"{"symbols": [
                    {"symbol": "ABCUSDT", "onboardDate": 1700000000000, "status": "TRADING",
                     "filters": [{"filterType": "LOT_SIZE", "stepSize": "0.01", "minQty": "0.01"}]},
                    {"symbol": "OLDUSDT", "onboardDate": 1500000000000, "status": "SETTLING"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = BinanceClient::public(&server.url()).unwrap();
        let instruments = client.fetch_catalogue().await.unwrap();

        mock.assert_async().await;
        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].quantity_rule().step, dec!(0.01));
        assert_eq!(instruments[1].status.as_str(), "SETTLING");
    }

    #[tokio::test]
    async fn test_fetch_price() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/ticker/price")
            .match_query(Matcher::UrlEncoded("symbol".into(), "ABCUSDT".into()))
            .with_body(r#"{"symbol": "ABCUSDT", "price": "2.00", "time": 1}"#)
            .create_async()
            .await;

        let client = client(&server.url(), AccountMode::Unified);
        assert_eq!(client.fetch_price("ABCUSDT").await.unwrap(), dec!(2));
    }

    #[tokio::test]
    async fn test_submit_order_is_signed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/fapi/v1/order")
            .match_header("X-MBX-APIKEY", "test-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "ABCUSDT".into()),
                Matcher::UrlEncoded("side".into(), "SELL".into()),
                Matcher::UrlEncoded("type".into(), "MARKET".into()),
                Matcher::UrlEncoded("notional".into(), "100".into()),
                Matcher::UrlEncoded("newOrderRespType".into(), "RESULT".into()),
                Matcher::UrlEncoded("recvWindow".into(), "10000".into()),
                Matcher::Regex("timestamp=\\d{13}".into()),
                Matcher::Regex("&signature=[0-9a-f]{64}$".into()),
            ]))
            .with_body(FILLED)
            .create_async()
            .await;

        let client = client(&server.url(), AccountMode::Dedicated);
        let result = client.submit_order(&sell_notional()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.order_id, 7);
        assert_eq!(result.avg_price, Some(dec!(10)));
    }

    #[tokio::test]
    async fn test_unified_orders_route_to_portfolio_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/papi/v1/um/order")
            .match_query(Matcher::UrlEncoded("quantity".into(), "50.00".into()))
            .with_body(FILLED)
            .create_async()
            .await;

        let client = client(&server.url(), AccountMode::Unified);
        let intent = OrderIntent::market(
            "ABCUSDT",
            Side::Sell,
            OrderSize::Quantity("50.00".to_string()),
            PositionSide::Both,
        );
        client.submit_order(&intent).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_throttled_request_retried_until_exhausted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/fapi/v1/order")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body(r#"{"code": -1008, "msg": "Request throttled by system-level protection."}"#)
            .expect(3)
            .create_async()
            .await;

        let client = client(&server.url(), AccountMode::Dedicated);
        let err = client.submit_order(&sell_notional()).await.unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.kind(), ErrorKind::RetryableExchange);
    }

    #[tokio::test]
    async fn test_each_attempt_is_signed_with_a_fresh_timestamp() {
        let mut server = mockito::Server::new_async().await;
        let seen: Arc<std::sync::Mutex<Vec<String>>> = Arc::default();
        let on_status = Arc::clone(&seen);
        let on_body = Arc::clone(&seen);
        let mock = server
            .mock("POST", "/fapi/v1/order")
            .match_query(Matcher::Any)
            .with_status_code_from_request(move |req| {
                let mut seen = on_status.lock().unwrap();
                seen.push(req.path_and_query().to_string());
                if seen.len() == 1 { 503 } else { 200 }
            })
            .with_body_from_request(move |_| {
                if on_body.lock().unwrap().len() == 1 {
                    br#"{"code": -1008, "msg": "Request throttled by system-level protection."}"#.to_vec()
                } else {
                    FILLED.as_bytes().to_vec()
                }
            })
            .expect(2)
            .create_async()
            .await;

        let settings = BinanceSettings {
            api_key: "test-key".to_string(),
            secret_key: "test-secret".to_string(),
            base_url: server.url(),
            market_data_url: server.url(),
            ..BinanceSettings::default()
        };
        let retry = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(20),
        };
        let client = BinanceClient::new(&settings, retry).unwrap();
        let result = client.submit_order(&sell_notional()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.order_id, 7);

        let seen = seen.lock().unwrap();
        let param = |query: &str, key: &str| {
            query
                .split(['?', '&'])
                .find_map(|pair| pair.strip_prefix(key).and_then(|v| v.strip_prefix('=')))
                .map(str::to_string)
        };
        let first_ts = param(&seen[0], "timestamp").unwrap();
        let second_ts = param(&seen[1], "timestamp").unwrap();
        assert!(second_ts.parse::<i64>().unwrap() > first_ts.parse::<i64>().unwrap());
        assert_ne!(param(&seen[0], "signature"), param(&seen[1], "signature"));
    }

    #[tokio::test]
    async fn test_dropped_connection_is_transient_and_retried() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let accepted = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            // Close every connection without answering
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                drop(socket);
            }
        });

        let client = client(&url, AccountMode::Dedicated);
        let err = client.submit_order(&sell_notional()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TransientNetwork);
        assert_eq!(accepted.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = BinanceClient::public(&format!("http://127.0.0.1:{}", port)).unwrap();

        let err = client.fetch_price("ABCUSDT").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    }

    #[tokio::test]
    async fn test_unknown_error_is_never_resubmitted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/fapi/v1/order")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body(
                r#"{"code": -1000, "msg": "Unknown error, please check your request or try again later."}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client = client(&server.url(), AccountMode::Dedicated);
        let err = client.submit_order(&sell_notional()).await.unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.kind(), ErrorKind::AmbiguousExecution);
    }

    #[tokio::test]
    async fn test_conditional_order_rejected_in_dedicated_mode() {
        // No mock registered: the call must fail before any request is sent
        let server = mockito::Server::new_async().await;
        let client = client(&server.url(), AccountMode::Dedicated);
        let intent = OrderIntent::trigger(
            "ABCUSDT",
            Side::Buy,
            OrderKind::StopMarket,
            OrderSize::Quantity("1".to_string()),
            "10.2".to_string(),
            PositionSide::Both,
            WorkingType::MarkPrice,
        );

        let err = client.submit_conditional_order(&intent).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_signed_call_without_credentials_is_validation_error() {
        let client = BinanceClient::public("http://127.0.0.1:9").unwrap();
        let err = client.query_order("ABCUSDT", 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_classify_http_errors() {
        let ambiguous = classify_http_error(
            503,
            r#"{"code": -1000, "msg": "Unknown error, please check your request or try again later."}"#,
        );
        assert_eq!(ambiguous.kind(), ErrorKind::AmbiguousExecution);

        let unavailable = classify_http_error(503, r#"{"code": -1001, "msg": "Service Unavailable."}"#);
        assert_eq!(unavailable.kind(), ErrorKind::RetryableExchange);

        let throttled = classify_http_error(503, r#"{"code": -1008, "msg": "busy"}"#);
        assert_eq!(throttled.kind(), ErrorKind::RetryableExchange);

        let rate_limited = classify_http_error(429, r#"{"code": -1003, "msg": "Too many requests"}"#);
        assert_eq!(rate_limited.kind(), ErrorKind::RetryableExchange);

        let rejected = classify_http_error(400, r#"{"code": -2019, "msg": "Margin is insufficient."}"#);
        assert_eq!(rejected.kind(), ErrorKind::RejectedExchange);
        assert_eq!(rejected.api_failure().map(|f| f.code), Some(-2019));

        let html = classify_http_error(502, "<html>Bad Gateway</html>");
        assert_eq!(html.kind(), ErrorKind::RejectedExchange);
        assert_eq!(html.api_failure().map(|f| f.msg.as_str()), Some("<html>Bad Gateway</html>"));
    }

    #[test]
    fn test_close_position_orders_omit_reduce_only() {
        let intent = OrderIntent::trigger(
            "ABCUSDT",
            Side::Buy,
            OrderKind::TakeProfitMarket,
            OrderSize::ClosePosition,
            "9.5".to_string(),
            PositionSide::Both,
            WorkingType::MarkPrice,
        );
        let params = order_params(&intent);
        let has = |k: &str, v: &str| params.iter().any(|(pk, pv)| *pk == k && pv == v);

        assert!(has("closePosition", "true"));
        assert!(has("stopPrice", "9.5"));
        assert!(has("priceProtect", "TRUE"));
        assert!(has("workingType", "MARK_PRICE"));
        assert!(!params.iter().any(|(k, _)| *k == "reduceOnly" || *k == "quantity"));
    }
}
