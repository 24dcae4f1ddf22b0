//! Concurrent fan-out and merge.
//!
//! A batch opens one [`Session`], dispatches every request of the batch
//! concurrently through it, waits for all of them, then merges the successful
//! tables into one `(date, ticker, exchange)` keyed table. A failed request is
//! logged and left out of the merge; it never aborts its siblings.
//!
//! Completion order is not observable in the result: outcomes are put back
//! into request order before merging and the merged table is sorted by key.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use time::Date;
use tracing::{info, warn};

use crate::bulk::fetch_bulk_spec;
use crate::dates::{days_inclusive, yesterday, IntoDate};
use crate::error::FetchError;
use crate::executor::{RequestExecutor, Session};
use crate::historical::fetch_history_spec;
use crate::request::{BulkKind, HistoryService, RequestSpec};
use crate::table::{IndexLayout, MergeMode, Table};

/// One symbol and its history window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSpec {
    pub ticker: String,
    pub exchange: String,
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl SymbolSpec {
    /// Full available history up to today.
    pub fn new(ticker: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            exchange: exchange.into(),
            from: None,
            to: None,
        }
    }

    /// Build a spec from ISO date strings or date values.
    pub fn parse(
        ticker: impl Into<String>,
        exchange: impl Into<String>,
        from: impl IntoDate,
        to: impl IntoDate,
    ) -> Result<Self, FetchError> {
        Ok(Self::new(ticker, exchange).with_range(Some(from.into_date()?), Some(to.into_date()?)))
    }

    pub fn with_range(mut self, from: Option<Date>, to: Option<Date>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn request(&self, service: HistoryService) -> RequestSpec {
        RequestSpec::history(
            service,
            self.exchange.as_str(),
            self.ticker.as_str(),
            self.from,
            self.to,
        )
    }
}

/// A request that failed, with the error that stopped it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub spec: RequestSpec,
    pub error: FetchError,
}

/// Result of one request within a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success { spec: RequestSpec, table: Table },
    Failure(FetchFailure),
}

impl FetchOutcome {
    pub fn spec(&self) -> &RequestSpec {
        match self {
            Self::Success { spec, .. } => spec,
            Self::Failure(failure) => &failure.spec,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Merged table of a batch plus the requests that did not contribute to it.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub table: Table,
    pub failures: Vec<FetchFailure>,
    pub requested: usize,
}

impl BatchReport {
    fn empty() -> Self {
        Self {
            table: Table::empty(IndexLayout::DateTickerExchange),
            failures: Vec::new(),
            requested: 0,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.requested - self.failures.len()
    }

    pub fn into_table(self) -> Table {
        self.table
    }
}

/// Run a batch of requests concurrently in one session and merge the results.
///
/// History requests are tagged with their ticker and exchange before merging.
/// An empty batch, or one where every request failed, yields an empty table.
/// Only a failure to open the session or a key conflict across successful
/// results is returned as an error.
pub async fn fetch_many(
    executor: &RequestExecutor,
    requests: Vec<RequestSpec>,
    mode: MergeMode,
) -> Result<BatchReport, FetchError> {
    if requests.is_empty() {
        return Ok(BatchReport::empty());
    }

    let requested = requests.len();
    let limit = executor
        .config()
        .max_in_flight
        .unwrap_or(requested)
        .max(1);

    let session = executor.open_session()?;
    info!(
        session = session.id(),
        requests = requested,
        max_in_flight = limit,
        "fan-out batch started"
    );

    let mut outcomes = stream::iter(requests.into_iter().enumerate())
        .map(|(index, spec)| {
            let session = &session;
            async move { (index, fetch_one(session, spec).await) }
        })
        .buffer_unordered(limit)
        .collect::<Vec<_>>()
        .await;
    outcomes.sort_by_key(|(index, _)| *index);
    drop(session);

    let mut tables = Vec::new();
    let mut failures = Vec::new();
    for (_, outcome) in outcomes {
        match outcome {
            FetchOutcome::Success { table, .. } => {
                if !table.is_empty() {
                    tables.push(table);
                }
            }
            FetchOutcome::Failure(failure) => {
                warn!(
                    request = %failure.spec,
                    exchange = failure.spec.exchange(),
                    ticker = failure.spec.ticker(),
                    code = failure.error.code(),
                    error = %failure.error,
                    "fetch failed, excluded from merge"
                );
                failures.push(failure);
            }
        }
    }

    let table = Table::merge(tables, mode)?;
    info!(
        requests = requested,
        failed = failures.len(),
        rows = table.len(),
        "fan-out batch finished"
    );

    Ok(BatchReport {
        table,
        failures,
        requested,
    })
}

async fn fetch_one(session: &Session<'_>, spec: RequestSpec) -> FetchOutcome {
    let fetched = match &spec {
        RequestSpec::History {
            ticker, exchange, ..
        } => fetch_history_spec(session, &spec)
            .await
            .map(|table| table.tagged(ticker, exchange)),
        RequestSpec::BulkDay { .. } => fetch_bulk_spec(session, &spec).await,
    };

    match fetched {
        Ok(table) => FetchOutcome::Success { spec, table },
        Err(error) => FetchOutcome::Failure(FetchFailure { spec, error }),
    }
}

/// Per-symbol history for many symbols, each over its own window.
///
/// Any key shared between two successful results is a data error.
pub async fn fetch_many_history(
    executor: &RequestExecutor,
    service: HistoryService,
    specs: &[SymbolSpec],
) -> Result<BatchReport, FetchError> {
    let requests = specs.iter().map(|spec| spec.request(service)).collect();
    fetch_many(executor, requests, MergeMode::VerifyUnique).await
}

/// Bulk requests for `(ticker, exchange)` pairs over a shared date range.
///
/// Tickers are grouped by exchange and one request is issued per exchange
/// and calendar day, both ends inclusive. `to` defaults to yesterday.
/// Non-trading days resolve to the previous session's data, so identical
/// rows are collapsed after sorting.
pub async fn fetch_many_bulk(
    executor: &RequestExecutor,
    symbols: &[(&str, &str)],
    from: Date,
    to: Option<Date>,
    kind: BulkKind,
) -> Result<BatchReport, FetchError> {
    let to = to.unwrap_or_else(yesterday);
    let requests = bulk_requests(symbols, from, to, kind);
    fetch_many(executor, requests, MergeMode::DropIdenticalRows).await
}

fn bulk_requests(symbols: &[(&str, &str)], from: Date, to: Date, kind: BulkKind) -> Vec<RequestSpec> {
    let mut by_exchange: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (ticker, exchange) in symbols {
        let tickers = by_exchange.entry(*exchange).or_default();
        if !tickers.iter().any(|known| known == ticker) {
            tickers.push((*ticker).to_owned());
        }
    }

    let days = days_inclusive(from, to);
    by_exchange
        .into_iter()
        .flat_map(|(exchange, tickers)| {
            days.iter().map(move |day| {
                RequestSpec::bulk_day(exchange, Some(*day), Some(tickers.clone()), kind)
            })
        })
        .collect()
}
