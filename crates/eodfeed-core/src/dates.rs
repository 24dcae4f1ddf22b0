//! Calendar date handling.
//!
//! All dates crossing the API boundary are date-only values in ISO
//! `YYYY-MM-DD` form. "Today" is evaluated in UTC.

use time::format_description::BorrowedFormatItem;
use time::macros::{date, format_description};
use time::{Date, OffsetDateTime};

use crate::error::FetchError;

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Default start of an open-ended history request.
pub const EARLIEST_DATE: Date = date!(1900 - 01 - 01);

/// Accepts either a date value or its ISO string form.
pub trait IntoDate {
    fn into_date(self) -> Result<Date, FetchError>;
}

impl IntoDate for Date {
    fn into_date(self) -> Result<Date, FetchError> {
        Ok(self)
    }
}

impl IntoDate for &Date {
    fn into_date(self) -> Result<Date, FetchError> {
        Ok(*self)
    }
}

impl IntoDate for &str {
    fn into_date(self) -> Result<Date, FetchError> {
        parse_iso_date(self)
    }
}

impl IntoDate for String {
    fn into_date(self) -> Result<Date, FetchError> {
        parse_iso_date(&self)
    }
}

impl IntoDate for &String {
    fn into_date(self) -> Result<Date, FetchError> {
        parse_iso_date(self)
    }
}

/// Parse a caller-supplied `YYYY-MM-DD` string.
pub fn parse_iso_date(input: &str) -> Result<Date, FetchError> {
    Date::parse(input.trim(), ISO_DATE).map_err(|_| {
        FetchError::InvalidDate {
            value: input.to_owned(),
        }
    })
}

/// Parse the date of an upstream record. A trailing time component is ignored.
pub(crate) fn parse_record_date(input: &str) -> Option<Date> {
    let trimmed = input.trim();
    let head = match trimmed.char_indices().nth(10) {
        Some((index, separator)) if separator == 'T' || separator == ' ' => &trimmed[..index],
        _ => trimmed,
    };
    Date::parse(head, ISO_DATE).ok()
}

pub fn format_iso_date(date: Date) -> String {
    date.format(ISO_DATE).unwrap_or_else(|_| date.to_string())
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// The most recent date the API has end-of-day data for.
pub fn yesterday() -> Date {
    today().previous_day().unwrap_or(Date::MIN)
}

/// Every calendar day from `from` to `to`, both inclusive.
pub fn days_inclusive(from: Date, to: Date) -> Vec<Date> {
    let mut days = Vec::new();
    let mut current = Some(from);
    while let Some(day) = current {
        if day > to {
            break;
        }
        days.push(day);
        current = day.next_day();
    }
    days
}
