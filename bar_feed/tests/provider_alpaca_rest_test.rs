#![cfg(test)]
use bar_feed::{
    Broker, HistDataReq, TradingCalendar,
    providers::alpaca_rest::{AlpacaBarsParams, AlpacaOptions, AlpacaProvider, Feed},
};
use serial_test::serial;

#[tokio::test]
#[serial]
#[ignore]
async fn test_alpaca_provider_fetch_bars() {
    // This test requires APCA_API_KEY_ID and APCA_API_SECRET_KEY to be set in the environment.
    if std::env::var("APCA_API_KEY_ID").is_err() || std::env::var("APCA_API_SECRET_KEY").is_err() {
        println!("Skipping test_alpaca_provider_fetch_bars: API keys not set.");
        return;
    }

    let provider = AlpacaProvider::from_env(AlpacaOptions {
        params: AlpacaBarsParams {
            feed: Some(Feed::Iex),
            limit: Some(5),
            ..Default::default()
        },
        ..Default::default()
    })
    .expect("Failed to create AlpacaProvider");

    let req = HistDataReq::parse("Stock", "AAPL", "1 day", "10 d", "2024-06-14", "America/New_York")
        .unwrap();
    let range = req.resolve(&TradingCalendar::us_federal()).unwrap();

    let rows = provider
        .fetch_bars(&req)
        .await
        .expect("fetch_bars returned an error");

    // limit=5 forces pagination; every trading day must still arrive
    assert_eq!(rows.len(), 10, "Expected one bar per trading day");
    assert!(rows.iter().all(|r| r.symbol == "AAPL"));
    assert!(rows.iter().all(|r| range.contains(r.timestamp)));
    assert!(rows.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_alpaca_provider_bad_credentials() {
    let provider = AlpacaProvider::with_credentials(
        "not-a-key".to_string().into(),
        "not-a-secret".to_string().into(),
        AlpacaOptions::default(),
    )
    .unwrap();
    let req = HistDataReq::parse("Stock", "AAPL", "1 day", "2 d", "2024-06-14", "America/New_York")
        .unwrap();
    let err = provider.fetch_bars(&req).await.unwrap_err();
    assert!(!err.is_retryable(), "{err}");
}
