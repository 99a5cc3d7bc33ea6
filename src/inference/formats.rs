//! Known date encodings
//!
//! The table is ordered: ISO forms first, then slash and dash forms with
//! month-first tried before day-first, then compact and textual forms.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::Value;

/// Largest epoch-second value accepted as a timestamp (2100-01-01)
const MAX_EPOCH_SECONDS: i64 = 4_102_444_800;

/// A single date encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// RFC 3339 with offset; the wall-clock time is kept
    Rfc3339,
    /// RFC 2822 (`Thu, 07 Mar 2024 10:00:00 +0000`)
    Rfc2822,
    /// Date-only strftime pattern
    Date(&'static str),
    /// Date-and-time strftime pattern
    DateTime(&'static str),
}

impl DateFormat {
    pub fn parse(&self, input: &str) -> Option<NaiveDateTime> {
        match self {
            DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(input)
                .ok()
                .map(|dt| dt.naive_local()),
            DateFormat::Rfc2822 => DateTime::parse_from_rfc2822(input)
                .ok()
                .map(|dt| dt.naive_local()),
            DateFormat::Date(pattern) => NaiveDate::parse_from_str(input, pattern)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            DateFormat::DateTime(pattern) => NaiveDateTime::parse_from_str(input, pattern).ok(),
        }
    }
}

impl std::fmt::Display for DateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateFormat::Rfc3339 => write!(f, "rfc3339"),
            DateFormat::Rfc2822 => write!(f, "rfc2822"),
            DateFormat::Date(p) | DateFormat::DateTime(p) => write!(f, "{}", p),
        }
    }
}

/// Strict ISO calendar date, the first normalization strategy
pub const ISO_DATE: DateFormat = DateFormat::Date("%Y-%m-%d");

/// Compact calendar date, also used for integer columns
pub const COMPACT_DATE: DateFormat = DateFormat::Date("%Y%m%d");

/// Label reported when a whole integer column is read as epoch seconds
pub const EPOCH_SECONDS: &str = "epoch-seconds";

/// Every format tried by inference and best-effort parsing, in order
pub const KNOWN_FORMATS: &[DateFormat] = &[
    DateFormat::Date("%Y-%m-%d"),
    DateFormat::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    DateFormat::DateTime("%Y-%m-%d %H:%M:%S%.f"),
    DateFormat::DateTime("%Y-%m-%dT%H:%M"),
    DateFormat::DateTime("%Y-%m-%d %H:%M"),
    DateFormat::Rfc3339,
    DateFormat::Rfc2822,
    DateFormat::Date("%Y/%m/%d"),
    DateFormat::DateTime("%Y/%m/%d %H:%M:%S"),
    DateFormat::Date("%m/%d/%Y"),
    DateFormat::DateTime("%m/%d/%Y %H:%M:%S"),
    DateFormat::DateTime("%m/%d/%Y %H:%M"),
    DateFormat::Date("%d/%m/%Y"),
    DateFormat::DateTime("%d/%m/%Y %H:%M:%S"),
    DateFormat::DateTime("%d/%m/%Y %H:%M"),
    DateFormat::Date("%d-%m-%Y"),
    DateFormat::DateTime("%d-%m-%Y %H:%M:%S"),
    DateFormat::Date("%d.%m.%Y"),
    DateFormat::DateTime("%d.%m.%Y %H:%M:%S"),
    COMPACT_DATE,
    DateFormat::Date("%d %b %Y"),
    DateFormat::Date("%b %d %Y"),
    DateFormat::Date("%B %d, %Y"),
];

/// Parse text with the first known format that accepts it
pub fn parse_lenient(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    KNOWN_FORMATS.iter().find_map(|format| format.parse(input))
}

/// Interpret an integer as Unix epoch seconds within a plausible range
pub fn parse_epoch_seconds(seconds: i64) -> Option<NaiveDateTime> {
    if !(0..=MAX_EPOCH_SECONDS).contains(&seconds) {
        return None;
    }
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.naive_utc())
}

/// Interpret an integer as a compact `YYYYMMDD` date
pub fn parse_compact_date(value: i64) -> Option<NaiveDateTime> {
    if !(10_000_101..=99_991_231).contains(&value) {
        return None;
    }
    COMPACT_DATE.parse(&value.to_string())
}

/// Interpret an integer as a date: compact `YYYYMMDD` first, then epoch seconds
pub fn parse_integer(value: i64) -> Option<NaiveDateTime> {
    parse_compact_date(value).or_else(|| parse_epoch_seconds(value))
}

/// Temporal content of a non-null value, if it has any.
///
/// Integers are only read as dates when `allow_integers` is set.
pub fn parse_value(value: &Value, allow_integers: bool) -> Option<NaiveDateTime> {
    match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::Date(d) => d.and_hms_opt(0, 0, 0),
        Value::Text(s) => parse_lenient(s),
        Value::Integer(i) if allow_integers => parse_integer(*i),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_lenient_formats() {
        assert_eq!(parse_lenient("2024-03-07"), Some(ymd(2024, 3, 7)));
        assert_eq!(parse_lenient(" 2024/03/07 "), Some(ymd(2024, 3, 7)));
        assert_eq!(parse_lenient("20240307"), Some(ymd(2024, 3, 7)));
        assert_eq!(parse_lenient("07.03.2024"), Some(ymd(2024, 3, 7)));
        assert_eq!(parse_lenient("7 Mar 2024"), Some(ymd(2024, 3, 7)));
        assert_eq!(
            parse_lenient("2024-03-07T10:15:30.250"),
            NaiveDate::from_ymd_opt(2024, 3, 7)
                .unwrap()
                .and_hms_milli_opt(10, 15, 30, 250)
        );
    }

    #[test]
    fn test_month_first_before_day_first() {
        assert_eq!(parse_lenient("03/07/2024"), Some(ymd(2024, 3, 7)));
        // Only valid day-first
        assert_eq!(parse_lenient("25/12/2024"), Some(ymd(2024, 12, 25)));
    }

    #[test]
    fn test_rfc3339_keeps_wall_clock_date() {
        let parsed = parse_lenient("2024-03-07T23:30:00-05:00").unwrap();
        assert_eq!(parsed.date(), NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
    }

    #[test]
    fn test_rejects_garbage() {
        for input in ["N/A", "", "  ", "tomorrow", "2024-13-40", "12"] {
            assert_eq!(parse_lenient(input), None, "input {:?}", input);
        }
    }

    #[test]
    fn test_epoch_only_when_allowed() {
        let value = Value::Integer(1_709_769_600);
        assert_eq!(parse_value(&value, true), Some(ymd(2024, 3, 7)));
        assert_eq!(parse_value(&value, false), None);
        assert_eq!(parse_epoch_seconds(-1), None);
    }

    #[test]
    fn test_integer_dates() {
        assert_eq!(parse_integer(20_240_307), Some(ymd(2024, 3, 7)));
        assert_eq!(parse_integer(1_709_856_000), Some(ymd(2024, 3, 8)));
        // Eight digits but not a calendar date, read as epoch seconds
        assert_eq!(
            parse_integer(20_241_399),
            DateTime::from_timestamp(20_241_399, 0).map(|dt| dt.naive_utc())
        );
        assert_eq!(parse_compact_date(1_709_769_600), None);
        assert_eq!(parse_integer(-5), None);
        assert_eq!(
            parse_value(&Value::Integer(20_240_307), true),
            Some(ymd(2024, 3, 7))
        );
    }
}
