//! Behavior-driven tests for the production reqwest transport.
//!
//! These tests run the executor against a local mock server to verify the
//! wire parameters, status handling and timeout retries end to end.

use std::time::Duration;

use eodfeed_core::{ClientConfig, EodClient, FetchError, SymbolSpec};
use time::macros::date;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, timeout: Duration) -> EodClient {
    let config = ClientConfig::new("wire-token")
        .with_base_url(server.uri())
        .with_request_timeout(timeout);
    EodClient::new(config).expect("valid config")
}

#[tokio::test]
async fn history_request_sends_range_token_and_format() {
    // Given: A server expecting the full parameter set
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/eod/AAPL.US"))
        .and(query_param("from", "2021-01-01"))
        .and(query_param("to", "2021-01-05"))
        .and(query_param("period", "d"))
        .and(query_param("order", "a"))
        .and(query_param("api_token", "wire-token"))
        .and(query_param("fmt", "json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"[{"date":"2021-01-04","close":129.41}]"#),
        )
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&server, Duration::from_secs(5));

    // When: One symbol is fetched
    let table = client
        .historical()
        .eod(
            "US",
            "AAPL",
            Some(date!(2021 - 01 - 01)),
            Some(date!(2021 - 01 - 05)),
        )
        .await
        .expect("history");

    // Then: The row was decoded
    assert_eq!(table.len(), 1);
    assert_eq!(table.rows()[0].f64("close"), Some(129.41));
}

#[tokio::test]
async fn server_error_is_reported_once_without_retry() {
    // Given: A server that fails every request
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/div/AAPL.US"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&server, Duration::from_secs(5));

    // When: Dividends are fetched
    let error = client
        .historical()
        .dividends("US", "AAPL", None, None)
        .await
        .expect_err("server error");

    // Then: The status and body are surfaced
    assert!(matches!(
        error,
        FetchError::Upstream { status: 500, ref body, .. } if body == "boom"
    ));
}

#[tokio::test]
async fn slow_server_exhausts_three_attempts() {
    // Given: A server slower than the request timeout
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/eod/AAPL.US"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(Duration::from_secs(2)),
        )
        .expect(3)
        .mount(&server)
        .await;
    let client = client(&server, Duration::from_millis(100));

    // When: One symbol is fetched
    let error = client
        .historical()
        .eod("US", "AAPL", None, None)
        .await
        .expect_err("timeouts");

    // Then: Every attempt timed out
    assert!(matches!(
        error,
        FetchError::ExhaustedRetries { attempts: 3, .. }
    ));
}

#[tokio::test]
async fn batch_over_real_transport_keeps_successes() {
    // Given: One known and one unknown symbol
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/eod/AAPL.US"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"[{"date":"2021-01-04","close":129.41,"volume":1}]"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/eod/NOPE.US"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Ticker Not Found."))
        .mount(&server)
        .await;
    let client = client(&server, Duration::from_secs(5));

    // When: Both are fetched in one batch
    let table = client
        .multi()
        .eod(&[SymbolSpec::new("AAPL", "US"), SymbolSpec::new("NOPE", "US")])
        .await
        .expect("partial batch");

    // Then: Only the known symbol contributes rows
    assert_eq!(table.len(), 1);
    assert_eq!(table.rows()[0].key.ticker.as_deref(), Some("AAPL"));
}
