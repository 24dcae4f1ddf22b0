//! Behavior-driven tests for the request executor.
//!
//! These tests verify how a single request is retried, classified and
//! decoded, using the scripted transport.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use eodfeed_core::{
    ClientConfig, FetchError, FetchErrorKind, HistoryService, HttpError, HttpResponse,
    RequestExecutor, RequestSpec, ScriptedHttpClient,
};
use tracing_subscriber::fmt::MakeWriter;

fn executor(client: &Arc<ScriptedHttpClient>) -> RequestExecutor {
    let config = ClientConfig::new("secret-token").with_base_url("https://example.test");
    RequestExecutor::with_http_client(config, client.clone()).expect("valid config")
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn aapl_eod() -> RequestSpec {
    RequestSpec::history(HistoryService::Eod, "US", "AAPL", None, None)
}

// =============================================================================
// Executor: Retries
// =============================================================================

#[tokio::test]
async fn when_first_two_attempts_time_out_third_attempt_result_is_returned() {
    // Given: A transport that times out twice, then answers
    let client = Arc::new(ScriptedHttpClient::new().with_sequence(
        "/api/eod/AAPL.US",
        vec![
            Err(HttpError::timeout("request timeout")),
            Err(HttpError::timeout("request timeout")),
            Ok(HttpResponse::ok_json(r#"[{"date":"2021-01-04","close":129.41}]"#)),
        ],
    ));
    let executor = executor(&client);
    let session = executor.open_session().expect("session");

    // When: One request is executed
    let rows = session.execute(&aapl_eod()).await;

    // Then: The timeouts are invisible and exactly three attempts were made
    let rows = rows.expect("third attempt succeeds");
    assert_eq!(rows.len(), 1);
    assert_eq!(client.request_count(), 3);
}

#[tokio::test]
async fn when_every_attempt_times_out_exhausted_retries_is_raised_after_three() {
    // Given: A transport that always times out
    let client = Arc::new(
        ScriptedHttpClient::new().with_fallback(Err(HttpError::timeout("request timeout"))),
    );
    let executor = executor(&client);
    let session = executor.open_session().expect("session");

    // When: One request is executed
    let error = session.execute(&aapl_eod()).await.expect_err("must exhaust");

    // Then: The final timeout surfaces as exhausted retries, not swallowed
    assert_eq!(error.kind(), FetchErrorKind::ExhaustedRetry);
    assert!(matches!(error, FetchError::ExhaustedRetries { attempts: 3, .. }));
    assert_eq!(client.request_count(), 3);
}

// =============================================================================
// Executor: Error Classification
// =============================================================================

#[tokio::test]
async fn when_upstream_returns_500_error_is_raised_without_retry() {
    // Given: A transport answering with an HTTP 500
    let client = Arc::new(
        ScriptedHttpClient::new().with_fallback(Ok(HttpResponse::new(500, "internal error"))),
    );
    let executor = executor(&client);
    let session = executor.open_session().expect("session");

    // When: One request is executed
    let error = session.execute(&aapl_eod()).await.expect_err("must fail");

    // Then: Status and body are carried and only one request was made
    match error {
        FetchError::Upstream { status, body, url } => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal error");
            assert!(url.contains("/api/eod/AAPL.US"));
            assert!(!url.contains("secret-token"), "token must not leak: {url}");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn when_a_timeout_is_followed_by_404_the_404_is_final() {
    // Given: A timeout, then a not-found status
    let client = Arc::new(ScriptedHttpClient::new().with_sequence(
        "/api/eod/",
        vec![
            Err(HttpError::timeout("request timeout")),
            Ok(HttpResponse::new(404, "Ticker Not Found.")),
            Ok(HttpResponse::ok_json("[]")),
        ],
    ));
    let executor = executor(&client);
    let session = executor.open_session().expect("session");

    // When: One request is executed
    let error = session.execute(&aapl_eod()).await.expect_err("must fail");

    // Then: The non-2xx stops the loop on the second attempt
    assert_eq!(error.status(), Some(404));
    assert_eq!(client.request_count(), 2);
}

#[tokio::test]
async fn when_the_transport_fails_outright_the_attempt_is_logged_at_info() {
    // Given: A transport failing with a non-retryable error, and logs captured
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let client = Arc::new(
        ScriptedHttpClient::new().with_fallback(Err(HttpError::other("tls handshake failed"))),
    );
    let executor = executor(&client);
    let session = executor.open_session().expect("session");

    // When: One request is executed
    let error = session.execute(&aapl_eod()).await.expect_err("fatal");

    // Then: The single attempt has an info entry before the warning
    assert_eq!(error.kind(), FetchErrorKind::Transport);
    assert_eq!(client.request_count(), 1);
    let lines = logs.lines();
    let errored = lines
        .iter()
        .position(|line| line.contains("INFO") && line.contains("request errored"))
        .unwrap_or_else(|| panic!("no info entry: {lines:?}"));
    let failed = lines
        .iter()
        .position(|line| line.contains("WARN") && line.contains("request failed"))
        .unwrap_or_else(|| panic!("no warning: {lines:?}"));
    assert!(errored < failed, "log lines: {lines:?}");
    assert!(lines[errored].contains("attempt=1"), "log lines: {lines:?}");
    assert!(!lines.iter().any(|line| line.contains("secret-token")));
}

// =============================================================================
// Executor: Decoding
// =============================================================================

#[tokio::test]
async fn when_upstream_returns_empty_array_result_is_empty_not_error() {
    // Given: A transport answering with no records
    let client = Arc::new(ScriptedHttpClient::new());
    let executor = executor(&client);
    let session = executor.open_session().expect("session");

    // When: One request is executed
    let rows = session.execute(&aapl_eod()).await;

    // Then: No data is a valid answer
    assert!(rows.expect("empty array is valid").is_empty());
}

#[tokio::test]
async fn every_request_carries_token_and_json_format() {
    // Given: A scripted transport recording requests
    let client = Arc::new(ScriptedHttpClient::new());
    let executor = executor(&client);
    let session = executor.open_session().expect("session");

    // When: A history and a bulk request are executed
    session.execute(&aapl_eod()).await.expect("history");
    session
        .execute(&RequestSpec::bulk_day(
            "US",
            None,
            None,
            eodfeed_core::BulkKind::Splits,
        ))
        .await
        .expect("bulk");

    // Then: Both requests carry the token and format selector
    for request in client.requests() {
        assert_eq!(request.query_value("api_token"), Some("secret-token"));
        assert_eq!(request.query_value("fmt"), Some("json"));
    }
    assert_eq!(client.requests()[1].query_value("type"), Some("splits"));
}
