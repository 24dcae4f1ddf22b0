//! Whole-exchange fetches for a single trading day.

use time::Date;

use crate::dates::IntoDate;
use crate::error::FetchError;
use crate::executor::{RequestExecutor, Session};
use crate::request::{BulkKind, RequestSpec};
use crate::table::{IndexLayout, Table};

/// Bulk dividend fields the API sometimes returns as strings.
const DIVIDEND_NUMERIC_FIELDS: [&str; 2] = ["dividend", "unadjustedValue"];

/// Fetch one exchange on one day into a `(date, ticker, exchange)` keyed table.
///
/// `date` defaults to yesterday. Exchange holidays come back empty.
pub async fn fetch_bulk_day(
    session: &Session<'_>,
    exchange: &str,
    date: Option<Date>,
    tickers: Option<&[String]>,
    kind: BulkKind,
) -> Result<Table, FetchError> {
    let spec = RequestSpec::bulk_day(exchange, date, tickers.map(<[String]>::to_vec), kind);
    fetch_bulk_spec(session, &spec).await
}

pub(crate) async fn fetch_bulk_spec(
    session: &Session<'_>,
    spec: &RequestSpec,
) -> Result<Table, FetchError> {
    let rows = session.execute(spec).await?;
    if rows.is_empty() {
        return Ok(Table::empty(IndexLayout::DateTickerExchange));
    }

    let mut table = Table::from_bulk_rows(rows)?;
    if let RequestSpec::BulkDay {
        kind: BulkKind::Dividends,
        ..
    } = spec
    {
        table.coerce_numeric(&DIVIDEND_NUMERIC_FIELDS)?;
    }
    Ok(table)
}

/// Per-exchange bulk getters. Each call runs in its own session.
#[derive(Clone, Copy)]
pub struct Bulk<'a> {
    executor: &'a RequestExecutor,
}

impl<'a> Bulk<'a> {
    pub fn new(executor: &'a RequestExecutor) -> Self {
        Self { executor }
    }

    /// End-of-day prices for an exchange, optionally restricted to `tickers`.
    pub async fn eod(
        &self,
        exchange: &str,
        date: Option<Date>,
        tickers: Option<&[String]>,
    ) -> Result<Table, FetchError> {
        self.fetch(exchange, date, tickers, BulkKind::Eod).await
    }

    /// End-of-day prices for a day given as a date or an ISO string.
    pub async fn eod_on(
        &self,
        exchange: &str,
        date: impl IntoDate,
        tickers: Option<&[String]>,
    ) -> Result<Table, FetchError> {
        let date = date.into_date()?;
        self.fetch(exchange, Some(date), tickers, BulkKind::Eod)
            .await
    }

    pub async fn dividends(&self, exchange: &str, date: Option<Date>) -> Result<Table, FetchError> {
        self.fetch(exchange, date, None, BulkKind::Dividends).await
    }

    pub async fn splits(&self, exchange: &str, date: Option<Date>) -> Result<Table, FetchError> {
        self.fetch(exchange, date, None, BulkKind::Splits).await
    }

    async fn fetch(
        &self,
        exchange: &str,
        date: Option<Date>,
        tickers: Option<&[String]>,
        kind: BulkKind,
    ) -> Result<Table, FetchError> {
        let session = self.executor.open_session()?;
        fetch_bulk_day(&session, exchange, date, tickers, kind).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use time::macros::date;

    use super::*;
    use crate::config::ClientConfig;
    use crate::http_client::{HttpResponse, ScriptedHttpClient};
    use crate::table::RowKey;

    fn executor(client: Arc<ScriptedHttpClient>) -> RequestExecutor {
        let config = ClientConfig::new("token").with_base_url("https://example.test");
        RequestExecutor::with_http_client(config, client).expect("valid config")
    }

    #[tokio::test]
    async fn bulk_eod_keys_rows_by_date_ticker_exchange() {
        let client = Arc::new(ScriptedHttpClient::new().with_route(
            "/api/eod-bulk-last-day/US",
            Ok(HttpResponse::ok_json(
                r#"[
                    {"code":"MSFT","exchange_short_name":"US","date":"2021-01-08","close":219.62},
                    {"code":"AAPL","exchange_short_name":"US","date":"2021-01-08","close":132.05}
                ]"#,
            )),
        ));
        let executor = executor(Arc::clone(&client));
        let tickers = vec![String::from("AAPL"), String::from("MSFT")];

        let table = Bulk::new(&executor)
            .eod("US", Some(date!(2021 - 01 - 08)), Some(tickers.as_slice()))
            .await
            .expect("bulk day");

        assert_eq!(
            table.rows()[0].key,
            RowKey::composite(date!(2021 - 01 - 08), "AAPL", "US")
        );
        let sent = &client.requests()[0];
        assert_eq!(sent.query_value("symbols"), Some("AAPL.US,MSFT.US"));
        assert_eq!(sent.query_value("type"), None);
    }

    #[tokio::test]
    async fn bulk_day_accepts_an_iso_string() {
        let client = Arc::new(ScriptedHttpClient::new());
        let executor = executor(Arc::clone(&client));
        let bulk = Bulk::new(&executor);

        let table = bulk.eod_on("JSE", "2021-01-08", None).await.expect("bulk day");
        assert!(table.is_empty());
        assert_eq!(client.requests()[0].query_value("date"), Some("2021-01-08"));

        let error = bulk.eod_on("JSE", "2021-02-30", None).await.expect_err("bad date");
        assert!(matches!(error, FetchError::InvalidDate { .. }));
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn bulk_dividends_coerce_string_amounts() {
        let client = Arc::new(ScriptedHttpClient::new().with_fallback(Ok(HttpResponse::ok_json(
            r#"[{"code":"NPN","exchange":"JSE","date":"2021-09-08","dividend":"5.93","unadjustedValue":""}]"#,
        ))));
        let executor = executor(Arc::clone(&client));

        let table = Bulk::new(&executor)
            .dividends("JSE", None)
            .await
            .expect("bulk dividends");

        let row = &table.rows()[0];
        assert_eq!(row.get("dividend"), Some(&json!(5.93)));
        assert_eq!(row.get("unadjustedValue"), Some(&serde_json::Value::Null));
        assert_eq!(client.requests()[0].query_value("type"), Some("dividends"));
    }

    #[tokio::test]
    async fn holiday_is_an_empty_table() {
        let client = Arc::new(ScriptedHttpClient::new());
        let executor = executor(client);

        let table = Bulk::new(&executor)
            .splits("US", Some(date!(2021 - 01 - 09)))
            .await
            .expect("empty is valid");
        assert!(table.is_empty());
        assert_eq!(table.layout(), IndexLayout::DateTickerExchange);
    }
}
