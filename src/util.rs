use crate::errors::{DataHubError, Result};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Asia::Riyadh;

const MILLNAMES: [&str; 5] = ["", "k", "M", "B", "T"];

/// Parse `YYYY-MM-DD`.
pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|e| DataHubError::DataError(format!("Invalid date {:?} (expected YYYY-MM-DD): {}", date_str, e)))
}

/// Compact human form of a large number: `1234567.0` -> `1M`, `2500.0` with
/// one decimal -> `2.5k`. Trailing zeros after the point are dropped.
pub fn millify(value: f64, precision: usize) -> String {
    let idx = if value == 0.0 || !value.is_finite() {
        0
    } else {
        ((value.abs().log10() / 3.0).floor().max(0.0) as usize).min(MILLNAMES.len() - 1)
    };
    let scaled = value / 1000f64.powi(idx as i32);
    let mut text = format!("{:.*}", precision, scaled);
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{}{}", text, MILLNAMES[idx])
}

/// Unix seconds rendered as wall-clock time on the exchange (Asia/Riyadh).
pub fn riyadh_time(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.with_timezone(&Riyadh).format("%I:%M:%S %p").to_string())
}

/// First `max_chars` characters of `text` followed by `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
