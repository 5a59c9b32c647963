use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use listing_trader::api::{BinanceClient, RetryConfig};
use listing_trader::config::{AccountMode, BinanceSettings, TradingSettings};
use listing_trader::discovery::ListingMonitor;
use listing_trader::engine::TradingEngine;
use listing_trader::ErrorKind;
use mockito::{Matcher, ServerGuard};
use tokio_util::sync::CancellationToken;

fn client(server: &ServerGuard, mode: AccountMode) -> BinanceClient {
    let settings = BinanceSettings {
        api_key: "e2e-key".to_string(),
        secret_key: "e2e-secret".to_string(),
        account_mode: mode,
        base_url: server.url(),
        market_data_url: server.url(),
        ..BinanceSettings::default()
    };
    let retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    };
    BinanceClient::new(&settings, retry).unwrap()
}

fn engine(client: BinanceClient) -> (Arc<ListingMonitor>, TradingEngine) {
    let monitor = Arc::new(ListingMonitor::new(client.clone()).with_poll_interval(Duration::from_secs(3600)));
    let engine = TradingEngine::from_client(client, Arc::clone(&monitor), TradingSettings::default());
    (monitor, engine)
}

fn exchange_info(onboard_date: i64) -> String {
    format!(
        r#"{{"symbols": [{{
            "symbol": "ABCUSDT", "onboardDate": {}, "status": "TRADING",
            "filters": [
                {{"filterType": "PRICE_FILTER", "minPrice": "0.01", "tickSize": "0.01"}},
                {{"filterType": "LOT_SIZE", "minQty": "0.01", "stepSize": "0.01"}}
            ]
        }}]}}"#,
        onboard_date
    )
}

fn filled(order_id: i64, avg_price: &str, qty: &str) -> String {
    format!(
        r#"{{"orderId": {}, "symbol": "ABCUSDT", "status": "FILLED", "clientOrderId": "x",
            "avgPrice": "{}", "origQty": "{}", "executedQty": "{}", "cumQuote": "100",
            "type": "MARKET", "side": "SELL", "updateTime": 1}}"#,
        order_id, avg_price, qty, qty
    )
}

#[tokio::test]
async fn test_dedicated_flow_discover_place_and_refuse_repeat() {
    let mut server = mockito::Server::new_async().await;
    let future = chrono::Utc::now().timestamp_millis() + 10 * 60 * 1000;
    server
        .mock("GET", "/fapi/v1/exchangeInfo")
        .with_body(exchange_info(future))
        .create_async()
        .await;
    let entry = server
        .mock("POST", "/fapi/v1/order")
        .match_header("X-MBX-APIKEY", "e2e-key")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("type".into(), "MARKET".into()),
            Matcher::UrlEncoded("notional".into(), "100".into()),
        ]))
        .with_body(filled(1, "10.00", "10"))
        .expect(1)
        .create_async()
        .await;
    let legs = server
        .mock("POST", "/fapi/v1/order")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("closePosition".into(), "true".into()),
            Matcher::UrlEncoded("side".into(), "BUY".into()),
        ]))
        .with_body(filled(2, "0", "0"))
        .expect(2)
        .create_async()
        .await;

    let (monitor, engine) = engine(client(&server, AccountMode::Dedicated));
    let cancel = CancellationToken::new();
    let handle = monitor.start(cancel.clone()).await.unwrap();

    // Startup run classified the future listing
    let listing = monitor.get_listing("ABCUSDT").await.unwrap();
    assert!(!listing.ordered);

    let set = engine.place_bracket_order("ABCUSDT", Some("100")).await.unwrap();
    assert_eq!(set.entry.order_id, 1);
    assert!(set.stop_loss_error().is_none());
    assert!(set.take_profit_error().is_none());
    assert!(monitor.get_listing("ABCUSDT").await.unwrap().ordered);

    let err = engine.place_bracket_order("ABCUSDT", Some("100")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("already ordered"));

    entry.assert_async().await;
    legs.assert_async().await;

    let status = engine.status().await;
    assert_eq!(status.instrument_count, 1);
    assert_eq!(status.listing_count, 1);
    assert!(status.trading_enabled);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_unified_flow_resolves_filters_for_manual_symbol() {
    let mut server = mockito::Server::new_async().await;
    // Only consulted because the manual placeholder carries no filters
    let info = server
        .mock("GET", "/fapi/v1/exchangeInfo")
        .with_body(exchange_info(1_500_000_000_000))
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/fapi/v1/ticker/price")
        .match_query(Matcher::Any)
        .with_body(r#"{"symbol": "ABCUSDT", "price": "2.00"}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/papi/v1/um/order")
        .match_query(Matcher::UrlEncoded("quantity".into(), "50.00".into()))
        .with_body(filled(21, "2.00", "50.00"))
        .create_async()
        .await;
    let conditional = server
        .mock("POST", "/papi/v1/um/conditional/order")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("quantity".into(), "50.00".into()),
            Matcher::UrlEncoded("reduceOnly".into(), "true".into()),
        ]))
        .with_body(
            r#"{"strategyId": 22, "newClientStrategyId": "s", "strategyStatus": "NEW",
                "strategyType": "STOP_MARKET", "symbol": "ABCUSDT", "side": "BUY"}"#,
        )
        .expect(2)
        .create_async()
        .await;

    let (monitor, engine) = engine(client(&server, AccountMode::Unified));

    let set = engine.place_bracket_order("ABCUSDT", Some("100")).await.unwrap();

    info.assert_async().await;
    conditional.assert_async().await;
    assert_eq!(set.entry.order_id, 21);
    assert_eq!(set.stop_loss.unwrap().unwrap().order_id, 22);
    assert!(monitor.get_instrument("ABCUSDT").await.unwrap().has_rules());
    assert!(monitor.get_listing("ABCUSDT").await.unwrap().ordered);
}

#[tokio::test]
async fn test_failed_entry_leaves_listing_retryable() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/fapi/v1/exchangeInfo")
        .with_body(exchange_info(1_500_000_000_000))
        .create_async()
        .await;
    let entry = server
        .mock("POST", "/fapi/v1/order")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body(r#"{"code": -1001, "msg": "Service Unavailable."}"#)
        .expect(3)
        .create_async()
        .await;

    let (monitor, engine) = engine(client(&server, AccountMode::Dedicated));

    let err = engine.place_bracket_order("ABCUSDT", None).await.unwrap_err();
    entry.assert_async().await;
    assert_eq!(err.kind(), ErrorKind::RetryableExchange);
    assert!(!monitor.get_listing("ABCUSDT").await.unwrap().ordered);
}

#[tokio::test]
async fn test_unpriced_fill_still_blocks_a_second_short() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/fapi/v1/exchangeInfo")
        .with_body(exchange_info(1_500_000_000_000))
        .create_async()
        .await;
    server
        .mock("GET", "/fapi/v1/ticker/price")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"code": -1121, "msg": "Invalid symbol."}"#)
        .create_async()
        .await;
    let entry = server
        .mock("POST", "/fapi/v1/order")
        .match_query(Matcher::UrlEncoded("type".into(), "MARKET".into()))
        .with_body(filled(1, "0.00", "10"))
        .expect(1)
        .create_async()
        .await;

    let (monitor, engine) = engine(client(&server, AccountMode::Dedicated));

    let err = engine.place_bracket_order("ABCUSDT", Some("100")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("entry order 1"));
    assert!(monitor.get_listing("ABCUSDT").await.unwrap().ordered);

    let err = engine.place_bracket_order("ABCUSDT", Some("100")).await.unwrap_err();
    assert!(err.to_string().contains("already ordered"));
    entry.assert_async().await;
}

#[tokio::test]
async fn test_concurrent_triggers_place_one_entry() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/fapi/v1/exchangeInfo")
        .with_body(exchange_info(1_500_000_000_000))
        .create_async()
        .await;
    let slow_fill = filled(1, "10.00", "10");
    let entry = server
        .mock("POST", "/fapi/v1/order")
        .match_query(Matcher::UrlEncoded("type".into(), "MARKET".into()))
        .with_chunked_body(move |w| {
            std::thread::sleep(Duration::from_millis(300));
            w.write_all(slow_fill.as_bytes())
        })
        .expect(1)
        .create_async()
        .await;
    server
        .mock("POST", "/fapi/v1/order")
        .match_query(Matcher::UrlEncoded("closePosition".into(), "true".into()))
        .with_body(filled(2, "0", "0"))
        .create_async()
        .await;

    let (monitor, engine) = engine(client(&server, AccountMode::Dedicated));

    let (first, second) = tokio::join!(
        engine.place_bracket_order("ABCUSDT", Some("100")),
        engine.place_bracket_order("ABCUSDT", Some("100")),
    );

    entry.assert_async().await;
    let (ok, refused) = match (first, second) {
        (Ok(set), Err(e)) | (Err(e), Ok(set)) => (set, e),
        other => panic!("expected exactly one placement, got {:?}", other),
    };
    assert_eq!(ok.entry.order_id, 1);
    assert_eq!(refused.kind(), ErrorKind::Validation);
    assert!(refused.to_string().contains("placement already in progress"));
    assert!(monitor.get_listing("ABCUSDT").await.unwrap().ordered);
}
