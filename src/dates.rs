//! # Date Utilities Module
//!
//! Calendar date helpers for the fixed `YYYY-MM-DD` string form used
//! everywhere in the inventory. The format is fixed-width and zero-padded,
//! which is what makes plain string comparison a valid date comparison.

use chrono::{Duration, Local, NaiveDate};
use log::warn;
use std::cmp::Ordering;

/// Fixed date format used throughout the crate
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Current date in local calendar time as `YYYY-MM-DD`
pub fn today() -> String {
    Local::now().date_naive().format(DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` string into a calendar date
pub fn parse(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).ok()
}

/// Add `days` (negative allowed) to a `YYYY-MM-DD` date, rolling month and
/// year boundaries.
///
/// Total function: an unparsable input is returned unchanged rather than
/// failing, so noisy model output can never break date arithmetic.
pub fn add_days(date: &str, days: i64) -> String {
    match parse(date) {
        Some(d) => (d + Duration::days(days)).format(DATE_FORMAT).to_string(),
        None => {
            warn!("add_days: unparsable date '{}', returning it unchanged", date);
            date.to_string()
        }
    }
}

/// Compare two `YYYY-MM-DD` dates.
///
/// Lexicographic comparison is valid only because the format is fixed-width
/// and zero-padded.
pub fn compare(a: &str, b: &str) -> Ordering {
    a.cmp(b)
}
