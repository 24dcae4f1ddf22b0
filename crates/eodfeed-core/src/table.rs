//! Tabular results.
//!
//! A [`Table`] is an ordered sequence of [`Row`]s sorted ascending by
//! [`RowKey`]. Single-symbol tables are keyed by date alone; merged and bulk
//! tables by `(date, ticker, exchange)`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use serde_json::{Number, Value};
use time::Date;

use crate::dates::{format_iso_date, parse_record_date};
use crate::error::FetchError;

/// One decoded JSON record, schema varying per service.
pub type RawRow = serde_json::Map<String, Value>;

const DATE_FIELD: &str = "date";
const TICKER_FIELD: &str = "ticker";
const EXCHANGE_FIELD: &str = "exchange";

/// Upstream field names that are renamed on bulk records.
const BULK_RENAMES: [(&str, &str); 2] = [
    ("exchange_short_name", EXCHANGE_FIELD),
    ("code", TICKER_FIELD),
];

/// Which key components index a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexLayout {
    Date,
    DateTicker,
    DateTickerExchange,
}

impl IndexLayout {
    pub const fn names(self) -> &'static [&'static str] {
        match self {
            Self::Date => &[DATE_FIELD],
            Self::DateTicker => &[DATE_FIELD, TICKER_FIELD],
            Self::DateTickerExchange => &[DATE_FIELD, TICKER_FIELD, EXCHANGE_FIELD],
        }
    }
}

/// Sort and identity key of a row. Ordered by date, then ticker, then exchange.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    pub date: Date,
    pub ticker: Option<String>,
    pub exchange: Option<String>,
}

impl RowKey {
    pub fn date(date: Date) -> Self {
        Self {
            date,
            ticker: None,
            exchange: None,
        }
    }

    pub fn composite(date: Date, ticker: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            date,
            ticker: Some(ticker.into()),
            exchange: Some(exchange.into()),
        }
    }
}

impl Display for RowKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_iso_date(self.date))?;
        if let Some(ticker) = &self.ticker {
            write!(f, "/{ticker}")?;
        }
        if let Some(exchange) = &self.exchange {
            write!(f, "/{exchange}")?;
        }
        Ok(())
    }
}

/// A canonical row: its key plus the remaining fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: RowKey,
    pub fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new(key: RowKey, fields: BTreeMap<String, Value>) -> Self {
        Self { key, fields }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Numeric view of a field, accepting numbers and numeric strings.
    pub fn f64(&self, column: &str) -> Option<f64> {
        match self.fields.get(column)? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

/// How [`Table::merge`] treats rows that share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Any shared key is a data error.
    VerifyUnique,
    /// Identical rows collapse into one; differing rows under one key are a data error.
    DropIdenticalRows,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    layout: IndexLayout,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn empty(layout: IndexLayout) -> Self {
        Self {
            layout,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Build a table from rows, sorting them by key. Keys are not checked.
    pub fn from_rows(layout: IndexLayout, mut rows: Vec<Row>) -> Self {
        rows.sort_by(|left, right| left.key.cmp(&right.key));
        let columns = column_union(&rows);
        Self {
            layout,
            columns,
            rows,
        }
    }

    /// Date-keyed table from per-symbol history records.
    pub(crate) fn from_history_rows(raw: Vec<RawRow>, context: &str) -> Result<Self, FetchError> {
        let rows = raw
            .into_iter()
            .map(|mut record| {
                let date = take_date(&mut record)?;
                Ok(Row::new(RowKey::date(date), record.into_iter().collect()))
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        let table = Self::from_rows(IndexLayout::Date, rows);
        table.verify_unique(context)?;
        Ok(table)
    }

    /// Composite-keyed table from bulk records, which echo ticker and exchange.
    pub(crate) fn from_bulk_rows(raw: Vec<RawRow>) -> Result<Self, FetchError> {
        let rows = raw
            .into_iter()
            .map(|mut record| {
                for (from, to) in BULK_RENAMES {
                    if let Some(value) = record.remove(from) {
                        record.insert(to.to_owned(), value);
                    }
                }
                let date = take_date(&mut record)?;
                let ticker = take_string(&mut record, TICKER_FIELD)?;
                let exchange = take_string(&mut record, EXCHANGE_FIELD)?;
                Ok(Row::new(
                    RowKey::composite(date, ticker, exchange),
                    record.into_iter().collect(),
                ))
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        Ok(Self::from_rows(IndexLayout::DateTickerExchange, rows))
    }

    pub const fn layout(&self) -> IndexLayout {
        self.layout
    }

    /// Non-key column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RowKey> {
        self.rows.iter().map(|row| &row.key)
    }

    pub fn get(&self, key: &RowKey) -> Option<&Row> {
        self.rows
            .binary_search_by(|row| row.key.cmp(key))
            .ok()
            .map(|index| &self.rows[index])
    }

    /// Attach the originating symbol to a date-keyed table.
    pub fn tagged(self, ticker: &str, exchange: &str) -> Self {
        let rows = self
            .rows
            .into_iter()
            .map(|row| Row {
                key: RowKey::composite(row.key.date, ticker, exchange),
                fields: row.fields,
            })
            .collect();

        Self {
            layout: IndexLayout::DateTickerExchange,
            columns: self.columns,
            rows,
        }
    }

    /// Coerce the named columns to JSON numbers. Blank strings become null.
    pub fn coerce_numeric(&mut self, columns: &[&str]) -> Result<(), FetchError> {
        for row in &mut self.rows {
            for column in columns {
                let Some(value) = row.fields.get_mut(*column) else {
                    continue;
                };
                *value = coerce_value(column, value)?;
            }
        }
        Ok(())
    }

    /// Concatenate composite-keyed tables, sort by key and enforce key uniqueness.
    ///
    /// Empty tables are skipped. The result of merging nothing is an empty table.
    pub fn merge<I>(tables: I, mode: MergeMode) -> Result<Self, FetchError>
    where
        I: IntoIterator<Item = Table>,
    {
        let mut rows = Vec::new();
        for table in tables {
            if table.is_empty() {
                continue;
            }
            if table.layout != IndexLayout::DateTickerExchange {
                return Err(FetchError::invalid_request(
                    "only tables keyed by (date, ticker, exchange) can be merged",
                ));
            }
            rows.extend(table.rows);
        }

        let mut merged = Self::from_rows(IndexLayout::DateTickerExchange, rows);
        if mode == MergeMode::DropIdenticalRows {
            merged.drop_identical_rows();
        }
        merged.verify_unique("merged table")?;
        Ok(merged)
    }

    /// Project to exactly `columns`, in that order. Missing values become null.
    pub fn select(&self, columns: &[&str]) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| Row {
                key: row.key.clone(),
                fields: columns
                    .iter()
                    .map(|column| {
                        let value = row.fields.get(*column).cloned().unwrap_or(Value::Null);
                        ((*column).to_owned(), value)
                    })
                    .collect(),
            })
            .collect();

        Self {
            layout: self.layout,
            columns: columns.iter().map(|column| (*column).to_owned()).collect(),
            rows,
        }
    }

    /// Remove the exchange key component, keeping `(date, ticker)`.
    pub fn drop_exchange(self) -> Result<Self, FetchError> {
        let rows = self
            .rows
            .into_iter()
            .map(|row| Row {
                key: RowKey {
                    exchange: None,
                    ..row.key
                },
                fields: row.fields,
            })
            .collect();

        let layout = match self.layout {
            IndexLayout::Date => IndexLayout::Date,
            IndexLayout::DateTicker | IndexLayout::DateTickerExchange => IndexLayout::DateTicker,
        };
        let mut table = Self::from_rows(layout, rows);
        table.columns = self.columns;
        table.verify_unique("table without exchange")?;
        Ok(table)
    }

    /// Rows as JSON objects with the key columns inlined.
    pub fn to_records(&self) -> Vec<RawRow> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = RawRow::new();
                record.insert(
                    DATE_FIELD.to_owned(),
                    Value::String(format_iso_date(row.key.date)),
                );
                if let Some(ticker) = &row.key.ticker {
                    record.insert(TICKER_FIELD.to_owned(), Value::String(ticker.clone()));
                }
                if let Some(exchange) = &row.key.exchange {
                    record.insert(EXCHANGE_FIELD.to_owned(), Value::String(exchange.clone()));
                }
                for (name, value) in &row.fields {
                    record.insert(name.clone(), value.clone());
                }
                record
            })
            .collect()
    }

    fn verify_unique(&self, context: &str) -> Result<(), FetchError> {
        match self.rows.windows(2).find(|pair| pair[0].key == pair[1].key) {
            Some(pair) => Err(FetchError::DataIntegrity {
                key: pair[0].key.to_string(),
                context: context.to_owned(),
            }),
            None => Ok(()),
        }
    }

    /// Rows are sorted, so duplicates of a row sit inside its key run.
    fn drop_identical_rows(&mut self) {
        let mut kept: Vec<Row> = Vec::with_capacity(self.rows.len());
        let mut run_start = 0;
        for row in std::mem::take(&mut self.rows) {
            if kept.last().map(|last| last.key != row.key).unwrap_or(true) {
                run_start = kept.len();
            }
            if !kept[run_start..].contains(&row) {
                kept.push(row);
            }
        }
        self.rows = kept;
    }
}

fn column_union(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .flat_map(|row| row.fields.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect()
}

fn take_date(record: &mut RawRow) -> Result<Date, FetchError> {
    match record.remove(DATE_FIELD) {
        Some(Value::String(text)) => {
            parse_record_date(&text).ok_or_else(|| FetchError::invalid_field(DATE_FIELD, text))
        }
        Some(other) => Err(FetchError::invalid_field(DATE_FIELD, other.to_string())),
        None => Err(FetchError::missing_field(DATE_FIELD)),
    }
}

fn take_string(record: &mut RawRow, field: &str) -> Result<String, FetchError> {
    match record.remove(field) {
        Some(Value::String(text)) => Ok(text),
        Some(other) => Err(FetchError::invalid_field(field, other.to_string())),
        None => Err(FetchError::missing_field(field)),
    }
}

fn coerce_value(column: &str, value: &Value) -> Result<Value, FetchError> {
    match value {
        Value::Null | Value::Number(_) => Ok(value.clone()),
        Value::String(text) if text.trim().is_empty() => Ok(Value::Null),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| FetchError::invalid_field(column, text.clone())),
        other => Err(FetchError::invalid_field(column, other.to_string())),
    }
}
