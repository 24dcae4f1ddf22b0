//! Multi-symbol getters with fixed output columns.

use time::Date;

use crate::coordinator::{fetch_many_bulk, fetch_many_history, SymbolSpec};
use crate::dates::IntoDate;
use crate::error::FetchError;
use crate::executor::RequestExecutor;
use crate::request::{BulkKind, HistoryService, FOREX_EXCHANGE, INDEX_EXCHANGE};
use crate::table::Table;

pub const EOD_COLUMNS: [&str; 6] = ["adjusted_close", "close", "high", "low", "open", "volume"];

pub const DIVIDEND_COLUMNS: [&str; 7] = [
    "currency",
    "declarationDate",
    "paymentDate",
    "period",
    "recordDate",
    "unadjustedValue",
    "value",
];

pub const SPLIT_COLUMNS: [&str; 1] = ["split"];

/// A ticker and window on an exchange implied by the getter, such as a
/// currency pair or an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerRange {
    pub ticker: String,
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl TickerRange {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            from: None,
            to: None,
        }
    }

    pub fn parse(
        ticker: impl Into<String>,
        from: impl IntoDate,
        to: impl IntoDate,
    ) -> Result<Self, FetchError> {
        Ok(Self::new(ticker).with_range(Some(from.into_date()?), Some(to.into_date()?)))
    }

    pub fn with_range(mut self, from: Option<Date>, to: Option<Date>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    fn on_exchange(&self, exchange: &str) -> SymbolSpec {
        SymbolSpec::new(self.ticker.as_str(), exchange).with_range(self.from, self.to)
    }
}

/// Many-symbol getters.
///
/// Each call is one concurrent batch. Symbols that fail are left out of the
/// returned table; see [`fetch_many_history`] for the per-request failures.
#[derive(Clone, Copy)]
pub struct MultiHistorical<'a> {
    executor: &'a RequestExecutor,
}

impl<'a> MultiHistorical<'a> {
    pub fn new(executor: &'a RequestExecutor) -> Self {
        Self { executor }
    }

    pub async fn eod(&self, specs: &[SymbolSpec]) -> Result<Table, FetchError> {
        self.history(HistoryService::Eod, specs, &EOD_COLUMNS).await
    }

    pub async fn dividends(&self, specs: &[SymbolSpec]) -> Result<Table, FetchError> {
        self.history(HistoryService::Dividends, specs, &DIVIDEND_COLUMNS)
            .await
    }

    pub async fn splits(&self, specs: &[SymbolSpec]) -> Result<Table, FetchError> {
        self.history(HistoryService::Splits, specs, &SPLIT_COLUMNS)
            .await
    }

    /// Currency pairs, keyed by `(date, ticker)`.
    pub async fn forex(&self, pairs: &[TickerRange]) -> Result<Table, FetchError> {
        self.implicit_exchange(FOREX_EXCHANGE, pairs).await
    }

    /// Market indices, keyed by `(date, ticker)`.
    pub async fn index(&self, indices: &[TickerRange]) -> Result<Table, FetchError> {
        self.implicit_exchange(INDEX_EXCHANGE, indices).await
    }

    /// End-of-day prices of many `(ticker, exchange)` pairs over one shared
    /// window, one bulk request per exchange and day.
    pub async fn bulk_eod(
        &self,
        symbols: &[(&str, &str)],
        from: Date,
        to: Option<Date>,
    ) -> Result<Table, FetchError> {
        let report = fetch_many_bulk(self.executor, symbols, from, to, BulkKind::Eod).await?;
        Ok(report.table.select(&EOD_COLUMNS))
    }

    async fn implicit_exchange(
        &self,
        exchange: &str,
        tickers: &[TickerRange],
    ) -> Result<Table, FetchError> {
        let specs = tickers
            .iter()
            .map(|ticker| ticker.on_exchange(exchange))
            .collect::<Vec<_>>();
        self.history(HistoryService::Eod, &specs, &EOD_COLUMNS)
            .await?
            .drop_exchange()
    }

    async fn history(
        &self,
        service: HistoryService,
        specs: &[SymbolSpec],
        columns: &[&str],
    ) -> Result<Table, FetchError> {
        let report = fetch_many_history(self.executor, service, specs).await?;
        Ok(report.table.select(columns))
    }
}
