//! Tolerant cell coercions.
//!
//! Rows in the store are edited by hand, so the same column can hold
//! `12`, `"12"`, `"$12.00"` or `"12 pcs"`. All of that tolerance lives here;
//! codecs call these helpers and everything above them sees clean values.
//!
//! Every function is total: unusable input yields `None`, never a panic.

use crate::cell::CellValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc};

/// Origin of numeric date serials (day 0). Serial 1 is 1899-12-31.
pub const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Largest serial we accept (9999-12-31).
const MAX_SERIAL: f64 = 2_958_465.0;

/// Date-time formats tried after ISO-8601 and numeric serials.
const LOCALE_DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const LOCALE_DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// Trimmed text; numbers and booleans are rendered as displayed.
pub fn text(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Empty => None,
        CellValue::Text(_) => cell.as_text().map(str::to_string),
        other => Some(other.display_text()),
    }
}

/// A number, stripping decoration such as currency symbols, thousands
/// separators and unit suffixes. `(5.00)` is read as `-5`.
pub fn number(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) => n.is_finite().then_some(*n),
        CellValue::Text(s) => number_from_text(s),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

fn number_from_text(s: &str) -> Option<f64> {
    let s = s.trim();
    let (negate, body) = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negate { -value } else { value })
}

/// A whole number. Fractional values are rejected rather than rounded.
pub fn integer(cell: &CellValue) -> Option<i64> {
    let n = number(cell)?;
    if n.fract() != 0.0 || n.abs() > i64::MAX as f64 {
        return None;
    }
    Some(n as i64)
}

/// Boolean-like values: `TRUE`, `yes`, `y`, `1`, `x`, check marks.
pub fn boolean(cell: &CellValue) -> Option<bool> {
    match cell {
        CellValue::Bool(b) => Some(*b),
        CellValue::Number(n) if *n == 1.0 => Some(true),
        CellValue::Number(n) if *n == 0.0 => Some(false),
        CellValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "x" | "✓" | "✔" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// A timestamp, trying in order: ISO-8601 text, numeric serial day count
/// from [`SERIAL_EPOCH`], then common locale formats. Text without an
/// offset is taken as UTC.
pub fn date(cell: &CellValue) -> Option<DateTime<Utc>> {
    match cell {
        CellValue::Number(n) => from_serial(*n),
        CellValue::Text(s) => date_from_text(s.trim()),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

fn date_from_text(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    iso_8601(s)
        .or_else(|| serial_text(s))
        .or_else(|| locale(s))
}

fn iso_8601(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(midnight)
}

fn serial_text(s: &str) -> Option<DateTime<Utc>> {
    if !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    from_serial(s.parse().ok()?)
}

fn locale(s: &str) -> Option<DateTime<Utc>> {
    for fmt in LOCALE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in LOCALE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return midnight(date);
        }
    }
    None
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Convert a spreadsheet serial (days since [`SERIAL_EPOCH`], fraction is
/// time of day) to a timestamp, rounded to the millisecond.
pub fn from_serial(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() || !(0.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let naive = epoch.checked_add_signed(TimeDelta::try_milliseconds(millis)?)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Canonical cell for a timestamp: RFC 3339 UTC with second precision.
pub fn date_cell(value: &DateTime<Utc>) -> CellValue {
    CellValue::Text(value.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Canonical cell for optional text.
pub fn text_cell(value: Option<&str>) -> CellValue {
    value.map_or(CellValue::Empty, CellValue::text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn t(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn decorated_numbers() {
        assert_eq!(number(&t("$1,234.50")), Some(1234.5));
        assert_eq!(number(&t("12 pcs")), Some(12.0));
        assert_eq!(number(&t("-3")), Some(-3.0));
        assert_eq!(number(&t("(5.00)")), Some(-5.0));
        assert_eq!(number(&CellValue::Number(7.25)), Some(7.25));
        assert_eq!(number(&t("n/a")), None);
        assert_eq!(number(&t("1.2.3")), None);
        assert_eq!(number(&t("2024-01-05")), None);
        assert_eq!(number(&CellValue::Empty), None);
    }

    #[test]
    fn integers_reject_fractions() {
        assert_eq!(integer(&t("40")), Some(40));
        assert_eq!(integer(&CellValue::Number(3.0)), Some(3));
        assert_eq!(integer(&t("3.5")), None);
    }

    #[test]
    fn boolean_like_strings() {
        assert_eq!(boolean(&t("TRUE")), Some(true));
        assert_eq!(boolean(&t(" yes ")), Some(true));
        assert_eq!(boolean(&t("x")), Some(true));
        assert_eq!(boolean(&t("No")), Some(false));
        assert_eq!(boolean(&CellValue::Number(0.0)), Some(false));
        assert_eq!(boolean(&t("maybe")), None);
    }

    #[test]
    fn text_renders_numbers() {
        assert_eq!(text(&CellValue::Number(1042.0)), Some("1042".to_string()));
        assert_eq!(text(&t("  widget ")), Some("widget".to_string()));
        assert_eq!(text(&t("   ")), None);
    }

    #[test]
    fn iso_dates() {
        let dt = date(&t("2024-03-15T10:30:00Z")).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2024, 3, 15, 10));

        let dt = date(&t("2024-03-15T10:30:00+02:00")).unwrap();
        assert_eq!(dt.hour(), 8);

        let dt = date(&t("2024-03-15")).unwrap();
        assert_eq!((dt.day(), dt.hour()), (15, 0));
    }

    #[test]
    fn serial_dates() {
        // 45366 = 2024-03-15
        let dt = date(&CellValue::Number(45366.0)).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 15));

        let dt = date(&CellValue::Number(45366.5)).unwrap();
        assert_eq!(dt.hour(), 12);

        let dt = date(&t("45366")).unwrap();
        assert_eq!(dt.day(), 15);

        assert!(date(&CellValue::Number(-1.0)).is_none());
        assert!(date(&CellValue::Number(1e12)).is_none());
    }

    #[test]
    fn locale_dates() {
        let dt = date(&t("3/15/2024")).unwrap();
        assert_eq!((dt.month(), dt.day()), (3, 15));

        let dt = date(&t("03/15/2024 14:05:09")).unwrap();
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (14, 5, 9));

        let dt = date(&t("15.03.2024")).unwrap();
        assert_eq!((dt.month(), dt.day()), (3, 15));

        let dt = date(&t("Mar 15, 2024")).unwrap();
        assert_eq!(dt.day(), 15);

        let dt = date(&t("3/15/2024 2:05:09 PM")).unwrap();
        assert_eq!(dt.hour(), 14);
    }

    #[test]
    fn garbage_dates() {
        assert!(date(&t("next tuesday")).is_none());
        assert!(date(&t("13/45/2024")).is_none());
        assert!(date(&CellValue::Bool(true)).is_none());
        assert!(date(&CellValue::Empty).is_none());
    }

    #[test]
    fn date_cell_roundtrip() {
        let dt = date(&t("2024-03-15T10:30:00Z")).unwrap();
        let cell = date_cell(&dt);
        assert_eq!(cell, t("2024-03-15T10:30:00Z"));
        assert_eq!(date(&cell), Some(dt));
    }
}
