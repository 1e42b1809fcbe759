// Utility functions for the finance backend

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Trim and upper-case a ticker. Returns `None` for blank input.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        None
    } else {
        Some(symbol)
    }
}

/// Parse an ISO-8601 timestamp or a bare `YYYY-MM-DD` date (start of day, UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Like [`parse_date`], but a bare date covers the whole day so it can serve
/// as an inclusive upper bound.
pub fn parse_end_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let last_instant = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)?;
    Some(date.and_time(last_instant).and_utc())
}
