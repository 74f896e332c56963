//! HTTP-level tests for the Yahoo Finance and FRED clients

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::logging::{init_test_logging, log_test_step};
use dcf_valuator::analysis::{current_risk_free_rate, DEFAULT_RISK_FREE_RATE};
use dcf_valuator::api::{FredClient, YahooClient};
use dcf_valuator::extractors::MetricsExtractor;
use dcf_valuator::models::{Config, Ticker};

/// Configuration pointing every provider at the mock server
fn mock_config(server: &MockServer, fred_api_key: Option<&str>) -> Config {
    let uri = server.uri();
    let api_key = fred_api_key.map(str::to_string);
    Config::from_lookup(move |key| match key {
        "YAHOO_BASE_URL" | "YAHOO_FUNDAMENTALS_BASE_URL" | "FRED_BASE_URL" => Some(uri.clone()),
        "FRED_API_KEY" => api_key.clone(),
        "FETCH_TIMEOUT_SECS" => Some("5".to_string()),
        _ => None,
    })
    .unwrap()
}

fn chart_body() -> serde_json::Value {
    json!({
        "chart": {
            "result": [{
                "meta": {
                    "symbol": "AAPL",
                    "shortName": "Apple Inc.",
                    "chartPreviousClose": 171.2
                },
                "timestamp": [1717000000, 1717086400, 1717172800],
                "indicators": { "quote": [{ "close": [189.1, null, 192.25] }] }
            }],
            "error": null
        }
    })
}

fn timeseries_body() -> serde_json::Value {
    json!({
        "timeseries": {
            "result": [
                {
                    "meta": { "symbol": ["AAPL"], "type": ["annualOperatingCashFlow"] },
                    "annualOperatingCashFlow": [
                        { "asOfDate": "2021-09-30", "reportedValue": { "raw": 100.0 } },
                        { "asOfDate": "2022-09-30", "reportedValue": { "raw": 120.0 } },
                        { "asOfDate": "2023-09-30", "reportedValue": { "raw": 110.0 } }
                    ]
                },
                {
                    "meta": { "symbol": ["AAPL"], "type": ["annualCapitalExpenditure"] },
                    "annualCapitalExpenditure": [
                        { "asOfDate": "2021-09-30", "reportedValue": { "raw": -12.0 } },
                        { "asOfDate": "2022-09-30", "reportedValue": { "raw": -9.0 } },
                        { "asOfDate": "2023-09-30", "reportedValue": { "raw": -9.0 } }
                    ]
                }
            ],
            "error": null
        }
    })
}

#[test_log::test(tokio::test)]
async fn test_yahoo_client_feeds_extractor() {
    init_test_logging();
    log_test_step("Extracting AAPL metrics from mocked Yahoo endpoints");

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/AAPL"))
        .and(query_param("range", "1y"))
        .and(query_param("interval", "1d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ws/fundamentals-timeseries/v1/finance/timeseries/AAPL"))
        .and(query_param("symbol", "AAPL"))
        .and(query_param("type", "annualOperatingCashFlow,annualCapitalExpenditure"))
        .respond_with(ResponseTemplate::new(200).set_body_json(timeseries_body()))
        .expect(1)
        .mount(&server)
        .await;

    let config = mock_config(&server, None);
    let client = YahooClient::new(&config).unwrap();
    let extractor = MetricsExtractor::new(Arc::new(client), Duration::from_secs(5), 1);

    let snapshot = extractor
        .extract(&Ticker::parse("aapl").unwrap())
        .await
        .expect("snapshot for AAPL");

    assert_eq!(snapshot.company_name, "Apple Inc.");
    assert_eq!(snapshot.current_price, Some(192.25));
    assert_eq!(snapshot.free_cash_flow, Some(110.0 - -10.0));
}

#[test_log::test(tokio::test)]
async fn test_unknown_symbol_yields_no_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/ZZZZINVALID"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        })))
        .expect(1) // client errors are not retried
        .mount(&server)
        .await;

    let config = mock_config(&server, None);
    let extractor = MetricsExtractor::new(
        Arc::new(YahooClient::new(&config).unwrap()),
        Duration::from_secs(5),
        3,
    );

    assert!(extractor
        .extract(&Ticker::parse("ZZZZINVALID").unwrap())
        .await
        .is_none());
}

#[test_log::test(tokio::test)]
async fn test_fred_rate_is_converted_from_percent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fred/series/observations"))
        .and(query_param("series_id", "DGS10"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("file_type", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "observations": [
                { "date": "2024-05-27", "value": "." },
                { "date": "2024-05-24", "value": "4.5" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = FredClient::new(&mock_config(&server, Some("test-key"))).unwrap();
    let rate = current_risk_free_rate(&client).await;

    assert!((rate - 0.045).abs() < 1e-12, "rate was {}", rate);
}

#[test_log::test(tokio::test)]
async fn test_fred_outage_falls_back_to_default_rate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fred/series/observations"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let client = FredClient::new(&mock_config(&server, Some("test-key"))).unwrap();
    assert_eq!(current_risk_free_rate(&client).await, DEFAULT_RISK_FREE_RATE);
}

#[test_log::test(tokio::test)]
async fn test_missing_fred_key_skips_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = FredClient::new(&mock_config(&server, None)).unwrap();
    assert_eq!(current_risk_free_rate(&client).await, DEFAULT_RISK_FREE_RATE);
}
