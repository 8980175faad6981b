//! Small predicates shared by the rule catalogues.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use serde_json::Value;

/// Whether a value counts as "filled in".
///
/// Absent, blank strings, zero numbers and empty lists are not present.
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for str {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Presence for String {
    fn is_present(&self) -> bool {
        self.as_str().is_present()
    }
}

impl<T: Presence + ?Sized> Presence for &T {
    fn is_present(&self) -> bool {
        (**self).is_present()
    }
}

impl<T: Presence> Presence for Option<T> {
    fn is_present(&self) -> bool {
        self.as_ref().is_some_and(Presence::is_present)
    }
}

impl Presence for i64 {
    fn is_present(&self) -> bool {
        *self != 0
    }
}

impl Presence for u32 {
    fn is_present(&self) -> bool {
        *self != 0
    }
}

impl Presence for f64 {
    fn is_present(&self) -> bool {
        !self.is_nan() && *self != 0.0
    }
}

impl<T> Presence for [T] {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Presence for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Presence for Value {
    fn is_present(&self) -> bool {
        match self {
            Value::Null => false,
            Value::String(s) => s.is_present(),
            Value::Number(n) => n.as_f64().is_some_and(|f| f.is_present()),
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => true,
        }
    }
}

pub fn is_present<P: Presence + ?Sized>(value: &P) -> bool {
    value.is_present()
}

/// Parse a calendar date from `YYYY-MM-DD`, a naive `YYYY-MM-DDTHH:MM:SS`
/// timestamp, or an RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|ts| ts.date())
}

pub fn is_valid_date(raw: &str) -> bool {
    parse_date(raw).is_some()
}

/// Finite, not NaN.
pub fn is_valid_number(value: f64) -> bool {
    value.is_finite()
}

/// Non-empty.
pub fn is_valid_array<T>(items: &[T]) -> bool {
    !items.is_empty()
}

/// `date` plus `days`, or `None` when the result is out of calendar range.
pub fn days_after(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    TimeDelta::try_days(days).and_then(|delta| date.checked_add_signed(delta))
}
