//! Gregorian date helpers for the compact `YYYYMMDD` form used in cache
//! file names and configuration.

use chrono::{Datelike, Months, NaiveDate};

use crate::error::CalendarError;

/// Parse a `YYYYMMDD` string into a [`NaiveDate`].
///
/// # Errors
///
/// Returns [`CalendarError::InvalidDate`] if the string is not eight digits
/// or does not name a real calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, CalendarError> {
    let value = value.trim();
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CalendarError::InvalidDate {
            value: value.to_string(),
        });
    }
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| CalendarError::InvalidDate {
        value: value.to_string(),
    })
}

/// Format a date as `YYYYMMDD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Parse a `MMDD` string into `(month, day)`.
///
/// 29 February is accepted; whether it exists in a given year is decided
/// when the recurring date is expanded.
pub fn parse_month_day(value: &str) -> Result<(u32, u32), CalendarError> {
    let value = value.trim();
    let invalid = || CalendarError::InvalidDate {
        value: value.to_string(),
    };
    if value.len() != 4 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let month: u32 = value[..2].parse().map_err(|_| invalid())?;
    let day: u32 = value[2..].parse().map_err(|_| invalid())?;
    // 2000 is a leap year, so every valid month/day combination exists.
    NaiveDate::from_ymd_opt(2000, month, day).ok_or_else(invalid)?;
    Ok((month, day))
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = first.and_then(|d| d.checked_add_months(Months::new(1)));
    match (first, next) {
        (Some(a), Some(b)) => (b - a).num_days() as u32,
        _ => 0,
    }
}

/// True for 29 February.
pub fn is_leap_day(date: NaiveDate) -> bool {
    date.month() == 2 && date.day() == 29
}
