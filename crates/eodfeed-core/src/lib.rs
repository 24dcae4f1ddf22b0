//! Concurrent end-of-day market data client.
//!
//! This crate contains:
//! - Configuration, retry policy and the HTTP transport seam
//! - A request executor with bounded retries and typed failures
//! - Single-symbol and whole-exchange fetchers producing sorted tables
//! - A fan-out coordinator that merges many fetches into one keyed table
//! - Multi-symbol getters with fixed per-kind column sets
//!
//! ```text
//! EodClient
//!   ├── historical()  one symbol      ─┐
//!   ├── bulk()        one exchange day ├─> Session ─> RequestExecutor ─> HttpClient
//!   ├── multi()       many symbols  ─> coordinator ─┘
//!   └── reference()   exchanges, symbols, fundamentals
//! ```

pub mod bulk;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod dates;
pub mod error;
pub mod executor;
pub mod facade;
pub mod historical;
pub mod http_client;
pub mod reference;
pub mod request;
pub mod retry;
pub mod table;

pub use bulk::{fetch_bulk_day, Bulk};
pub use client::EodClient;
pub use config::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
pub use coordinator::{
    fetch_many, fetch_many_bulk, fetch_many_history, BatchReport, FetchFailure, FetchOutcome,
    SymbolSpec,
};
pub use dates::{days_inclusive, parse_iso_date, today, yesterday, IntoDate, EARLIEST_DATE};
pub use error::{ConfigError, FetchError, FetchErrorKind};
pub use executor::{RequestExecutor, Session};
pub use facade::{MultiHistorical, TickerRange, DIVIDEND_COLUMNS, EOD_COLUMNS, SPLIT_COLUMNS};
pub use historical::{fetch_history, Historical};
pub use http_client::{
    Connector, HttpClient, HttpError, HttpErrorKind, HttpFuture, HttpRequest, HttpResponse,
    ReqwestConnector, ReqwestHttpClient, ScriptedHttpClient, ScriptedReply, SharedConnector,
};
pub use reference::{ExchangeInfo, ListedSymbol, Reference};
pub use request::{
    BulkKind, HistoryService, Period, RequestParams, RequestSpec, SortOrder, FOREX_EXCHANGE,
    INDEX_EXCHANGE,
};
pub use retry::{Backoff, RetryPolicy};
pub use table::{IndexLayout, MergeMode, RawRow, Row, RowKey, Table};
