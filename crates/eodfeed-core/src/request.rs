//! Typed request specifications and their wire-format parameters.

use std::fmt::{Display, Formatter};

use time::Date;

use crate::dates::{format_iso_date, today, yesterday, EARLIEST_DATE};

/// Exchange code the API uses for currency pairs.
pub const FOREX_EXCHANGE: &str = "FOREX";
/// Exchange code the API uses for market indices.
pub const INDEX_EXCHANGE: &str = "INDX";

/// Per-symbol history services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryService {
    Eod,
    Dividends,
    Splits,
}

impl HistoryService {
    pub const fn path(self) -> &'static str {
        match self {
            Self::Eod => "/api/eod",
            Self::Dividends => "/api/div",
            Self::Splits => "/api/splits",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eod => "eod",
            Self::Dividends => "dividends",
            Self::Splits => "splits",
        }
    }
}

impl Display for HistoryService {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record kind served by the bulk last-day service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BulkKind {
    /// End-of-day prices. Sent without a `type` parameter.
    #[default]
    Eod,
    Dividends,
    Splits,
}

impl BulkKind {
    pub const BULK_PATH: &'static str = "/api/eod-bulk-last-day";

    /// Value of the `type` parameter, if one is sent.
    pub const fn wire_type(self) -> Option<&'static str> {
        match self {
            Self::Eod => None,
            Self::Dividends => Some("dividends"),
            Self::Splits => Some("splits"),
        }
    }
}

/// Sampling period of a history request. Only daily bars are served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    Daily,
}

impl Period {
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Daily => "d",
        }
    }
}

/// Record order of a response. Rows are always requested oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
}

impl SortOrder {
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Ascending => "a",
        }
    }
}

/// Service-specific query parameters.
///
/// The token and response format are appended by the executor, never here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pub from: Option<Date>,
    pub to: Option<Date>,
    pub period: Option<Period>,
    pub order: Option<SortOrder>,
    pub date: Option<Date>,
    pub symbols: Option<String>,
    pub kind: Option<&'static str>,
}

impl RequestParams {
    /// Render to wire pairs in a fixed order, then append `api_token` and `fmt`.
    pub fn to_wire(&self, api_token: &str) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(9);
        let mut push = |name: &str, value: String| pairs.push((name.to_owned(), value));

        if let Some(from) = self.from {
            push("from", format_iso_date(from));
        }
        if let Some(to) = self.to {
            push("to", format_iso_date(to));
        }
        if let Some(date) = self.date {
            push("date", format_iso_date(date));
        }
        if let Some(period) = self.period {
            push("period", period.as_wire().to_owned());
        }
        if let Some(order) = self.order {
            push("order", order.as_wire().to_owned());
        }
        if let Some(kind) = self.kind {
            push("type", kind.to_owned());
        }
        if let Some(symbols) = &self.symbols {
            push("symbols", symbols.clone());
        }
        push("api_token", api_token.to_owned());
        push("fmt", String::from("json"));

        pairs
    }
}

/// One upstream call, constructed per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestSpec {
    /// Daily history of one symbol over a date range.
    History {
        service: HistoryService,
        exchange: String,
        ticker: String,
        from: Option<Date>,
        to: Option<Date>,
    },
    /// One exchange on one day, optionally restricted to a ticker set.
    BulkDay {
        exchange: String,
        date: Option<Date>,
        tickers: Option<Vec<String>>,
        kind: BulkKind,
    },
}

impl RequestSpec {
    pub fn history(
        service: HistoryService,
        exchange: impl Into<String>,
        ticker: impl Into<String>,
        from: Option<Date>,
        to: Option<Date>,
    ) -> Self {
        Self::History {
            service,
            exchange: exchange.into(),
            ticker: ticker.into(),
            from,
            to,
        }
    }

    pub fn bulk_day(
        exchange: impl Into<String>,
        date: Option<Date>,
        tickers: Option<Vec<String>>,
        kind: BulkKind,
    ) -> Self {
        Self::BulkDay {
            exchange: exchange.into(),
            date,
            tickers,
            kind,
        }
    }

    pub fn exchange(&self) -> &str {
        match self {
            Self::History { exchange, .. } | Self::BulkDay { exchange, .. } => exchange,
        }
    }

    /// The single ticker of a history request.
    pub fn ticker(&self) -> Option<&str> {
        match self {
            Self::History { ticker, .. } => Some(ticker),
            Self::BulkDay { .. } => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::History {
                service,
                exchange,
                ticker,
                ..
            } => format!("{}/{}.{}", service.path(), ticker, exchange),
            Self::BulkDay { exchange, .. } => format!("{}/{}", BulkKind::BULK_PATH, exchange),
        }
    }

    /// Wire parameters with defaults resolved against the current date.
    pub fn params(&self) -> RequestParams {
        match self {
            Self::History { from, to, .. } => RequestParams {
                from: Some(from.unwrap_or(EARLIEST_DATE)),
                to: Some(to.unwrap_or_else(today)),
                period: Some(Period::Daily),
                order: Some(SortOrder::Ascending),
                ..RequestParams::default()
            },
            Self::BulkDay {
                exchange,
                date,
                tickers,
                kind,
            } => RequestParams {
                date: Some(date.unwrap_or_else(yesterday)),
                order: Some(SortOrder::Ascending),
                kind: kind.wire_type(),
                symbols: tickers.as_ref().map(|tickers| {
                    tickers
                        .iter()
                        .map(|ticker| format!("{ticker}.{exchange}"))
                        .collect::<Vec<_>>()
                        .join(",")
                }),
                ..RequestParams::default()
            },
        }
    }
}

impl Display for RequestSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::History {
                service,
                exchange,
                ticker,
                ..
            } => write!(f, "{service} {ticker}.{exchange}"),
            Self::BulkDay {
                exchange,
                date,
                kind,
                ..
            } => {
                let day = date.map(format_iso_date).unwrap_or_else(|| String::from("latest"));
                write!(f, "bulk {kind:?} {exchange} {day}")
            }
        }
    }
}
