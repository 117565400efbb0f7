//! Lenient field parsing for spreadsheet-sourced records.
//!
//! Every parser here is total: malformed input yields `None`, `0.0` or
//! `false`, never an error. Exports are known to be messy and a partial
//! value is more useful than a failed run.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Parse a money-like value, mapping anything non-numeric to `0.0`.
pub fn parse_money(raw: &Value) -> f64 {
    parse_money_opt(raw).unwrap_or(0.0)
}

/// Parse a money-like value. JSON numbers pass through; strings go through
/// [`parse_money_str`]. Booleans, null, arrays and objects are not numbers.
pub fn parse_money_opt(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).map(normalize_zero),
        Value::String(s) => parse_money_str(s),
        _ => None,
    }
}

/// Parse a financial number string:
/// - Strip `$`, commas, whitespace
/// - Handle `(123.45)` → `-123.45`, also after stripping (`$(1,234.56)`)
/// - Returns None if non-numeric characters remain after stripping
pub fn parse_money_str(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let (is_negative, inner) = match cleaned.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };

    if inner.is_empty() {
        return None;
    }

    // Only digits and '.' may remain, plus one leading sign outside parens
    for (i, c) in inner.chars().enumerate() {
        match c {
            '0'..='9' | '.' => {}
            '-' | '+' if i == 0 && !is_negative => {}
            _ => return None,
        }
    }

    let value: f64 = inner.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(normalize_zero(if is_negative { -value } else { value }))
}

// "(0.00)" must not serialize as -0.0
fn normalize_zero(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

// ---------------------------------------------------------------------------
// Booleans
// ---------------------------------------------------------------------------

/// `true`, `1`, and the strings `yes`/`y`/`true`/`1` (any case) are true.
/// Everything else is false.
pub fn parse_bool(raw: &Value) -> bool {
    match raw {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "yes" | "y" | "true" | "1"
        ),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Conversion into a UTC timestamp, for every date encoding a record may carry.
pub trait ToDate {
    fn to_date(&self) -> Option<DateTime<Utc>>;
}

/// Resolve any supported date encoding. Returns `None` when unparseable.
pub fn parse_date<T: ToDate + ?Sized>(raw: &T) -> Option<DateTime<Utc>> {
    raw.to_date()
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

// Two-digit years first: "%Y" happily reads "26" as the year 26.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];

impl ToDate for str {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        let s = self.trim();
        if s.is_empty() {
            return None;
        }

        // Bare digits: epoch milliseconds
        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis);
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }

        for fmt in DATETIME_FORMATS {
            if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(ndt.and_utc());
            }
        }

        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return date.to_date();
            }
        }

        None
    }
}

impl ToDate for String {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        self.as_str().to_date()
    }
}

impl ToDate for Value {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::String(s) => s.to_date(),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                .and_then(DateTime::from_timestamp_millis),
            Value::Object(map) => {
                if let Some(inner) = map.get("$date") {
                    return inner.to_date();
                }
                // Stored timestamp wrapper: {seconds, nanoseconds} or {_seconds, _nanoseconds}
                let secs = map
                    .get("seconds")
                    .or_else(|| map.get("_seconds"))
                    .and_then(Value::as_i64)?;
                let nanos = map
                    .get("nanoseconds")
                    .or_else(|| map.get("_nanoseconds"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0)
                    .min(999_999_999);
                DateTime::from_timestamp(secs, nanos as u32)
            }
            _ => None,
        }
    }
}

impl ToDate for DateTime<Utc> {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        Some(*self)
    }
}

impl ToDate for NaiveDateTime {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        Some(self.and_utc())
    }
}

impl ToDate for NaiveDate {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        self.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc())
    }
}

/// Epoch milliseconds.
impl ToDate for i64 {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(*self)
    }
}

impl<T: ToDate> ToDate for Option<T> {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        self.as_ref().and_then(ToDate::to_date)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
