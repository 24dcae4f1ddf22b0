//! Single-symbol history fetches.

use time::Date;

use crate::dates::IntoDate;
use crate::error::FetchError;
use crate::executor::{RequestExecutor, Session};
use crate::request::{HistoryService, RequestSpec, FOREX_EXCHANGE};
use crate::table::{IndexLayout, Table};

/// Fetch the daily history of one symbol into a date-keyed table.
///
/// `from` defaults to 1900-01-01 and `to` to today. An empty upstream
/// response yields an empty table.
pub async fn fetch_history(
    session: &Session<'_>,
    service: HistoryService,
    exchange: &str,
    ticker: &str,
    from: Option<Date>,
    to: Option<Date>,
) -> Result<Table, FetchError> {
    let spec = RequestSpec::history(service, exchange, ticker, from, to);
    fetch_history_spec(session, &spec).await
}

pub(crate) async fn fetch_history_spec(
    session: &Session<'_>,
    spec: &RequestSpec,
) -> Result<Table, FetchError> {
    let rows = session.execute(spec).await?;
    if rows.is_empty() {
        return Ok(Table::empty(IndexLayout::Date));
    }
    Table::from_history_rows(rows, &spec.to_string())
}

/// Per-symbol getters. Each call runs in its own session.
///
/// Open-ended getters take `Option<Date>`; use [`Historical::between`] to pass
/// ISO strings.
#[derive(Clone, Copy)]
pub struct Historical<'a> {
    executor: &'a RequestExecutor,
}

impl<'a> Historical<'a> {
    pub fn new(executor: &'a RequestExecutor) -> Self {
        Self { executor }
    }

    pub async fn eod(
        &self,
        exchange: &str,
        ticker: &str,
        from: Option<Date>,
        to: Option<Date>,
    ) -> Result<Table, FetchError> {
        self.fetch(HistoryService::Eod, exchange, ticker, from, to)
            .await
    }

    pub async fn dividends(
        &self,
        exchange: &str,
        ticker: &str,
        from: Option<Date>,
        to: Option<Date>,
    ) -> Result<Table, FetchError> {
        self.fetch(HistoryService::Dividends, exchange, ticker, from, to)
            .await
    }

    pub async fn splits(
        &self,
        exchange: &str,
        ticker: &str,
        from: Option<Date>,
        to: Option<Date>,
    ) -> Result<Table, FetchError> {
        self.fetch(HistoryService::Splits, exchange, ticker, from, to)
            .await
    }

    /// History over an explicit window given as dates or ISO strings.
    ///
    /// A malformed date fails with `InvalidDate` before any request is sent.
    pub async fn between(
        &self,
        service: HistoryService,
        exchange: &str,
        ticker: &str,
        from: impl IntoDate,
        to: impl IntoDate,
    ) -> Result<Table, FetchError> {
        let (from, to) = (from.into_date()?, to.into_date()?);
        self.fetch(service, exchange, ticker, Some(from), Some(to))
            .await
    }

    /// Daily rates of a currency pair such as `USDZAR`.
    pub async fn forex(
        &self,
        pair: &str,
        from: Option<Date>,
        to: Option<Date>,
    ) -> Result<Table, FetchError> {
        self.fetch(HistoryService::Eod, FOREX_EXCHANGE, pair, from, to)
            .await
    }

    async fn fetch(
        &self,
        service: HistoryService,
        exchange: &str,
        ticker: &str,
        from: Option<Date>,
        to: Option<Date>,
    ) -> Result<Table, FetchError> {
        let session = self.executor.open_session()?;
        fetch_history(&session, service, exchange, ticker, from, to).await
    }
}
