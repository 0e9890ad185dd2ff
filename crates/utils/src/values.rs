use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Values above this magnitude are read as whole-number percentages.
pub const PCT_WHOLE_NUMBER_THRESHOLD: f64 = 1.2;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));
static SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2}|\d{4})$").expect("valid regex"));

/// A raw spreadsheet cell before coercion.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Bool(bool),
}

impl RawValue {
    /// Text view of the cell, trimmed. Numbers keep their natural formatting.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Empty => None,
            RawValue::Number(n) => Some(n.to_string()),
            RawValue::Text(s) => {
                let t = s.trim();
                if t.is_empty() { None } else { Some(t.to_string()) }
            }
            RawValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            RawValue::Bool(b) => Some(b.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_text().is_none()
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(RawValue::Empty)
    }
}

/// Parses a number written with the European convention: `.` groups
/// thousands and `,` is the decimal mark. Currency symbols, percent signs
/// and whitespace are dropped. Returns `None` for empty or non-finite input.
pub fn to_number_es(raw: &RawValue) -> Option<f64> {
    match raw {
        RawValue::Number(n) => n.is_finite().then_some(*n),
        RawValue::Bool(_) | RawValue::Date(_) | RawValue::Empty => None,
        RawValue::Text(s) => parse_number_es(s),
    }
}

fn parse_number_es(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '€' | '$' | '£' | '¥' | '%'))
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Normalizes a date cell to `YYYY-MM-DD`.
///
/// ISO strings pass through unchanged. `D/M/Y` with a 2- or 4-digit year is
/// reordered (2-digit years are taken as 20xx). Numeric cells are Excel
/// serial dates. Anything else goes through a list of common layouts.
pub fn to_date_iso(raw: &RawValue) -> Option<String> {
    match raw {
        RawValue::Empty | RawValue::Bool(_) => None,
        RawValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        RawValue::Number(n) => excel_serial_to_date(*n).map(|d| d.format("%Y-%m-%d").to_string()),
        RawValue::Text(s) => parse_date_text(s.trim()),
    }
}

fn parse_date_text(s: &str) -> Option<String> {
    if s.is_empty() {
        return None;
    }

    if ISO_DATE.is_match(s) {
        return Some(s.to_string());
    }

    if let Some(caps) = SLASH_DATE.captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if caps[3].len() == 2 {
            year += 2000;
        }
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return Some(date.format("%Y-%m-%d").to_string());
    }

    parse_generic_date(s).map(|d| d.format("%Y-%m-%d").to_string())
}

fn parse_generic_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    let datetime_formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    let date_formats = ["%Y/%m/%d", "%d.%m.%Y", "%d-%m-%Y", "%b %d, %Y", "%d %b %Y", "%B %d, %Y"];
    for fmt in date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    None
}

/// Serial of 9999-12-31, the last date Excel can hold.
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

/// Excel serial date conversion using the 1899-12-30 base.
pub fn excel_serial_to_date(v: f64) -> Option<NaiveDate> {
    if !v.is_finite() || !(1.0..EXCEL_MAX_SERIAL + 1.0).contains(&v) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::try_days(v.floor() as i64)?)
}

/// Parses a percentage. Magnitudes above [`PCT_WHOLE_NUMBER_THRESHOLD`] are
/// treated as whole-number percentages (`5,43` -> `0.0543`); smaller ones
/// are taken as already being fractions (`0,54` -> `0.54`).
pub fn to_pct(raw: &RawValue) -> Option<f64> {
    let n = to_number_es(raw)?;
    if n.abs() > PCT_WHOLE_NUMBER_THRESHOLD {
        Some(n / 100.0)
    } else {
        Some(n)
    }
}

/// Decomposes, strips diacritics, lowercases, trims and collapses inner
/// whitespace. Idempotent.
pub fn normalize_name(raw: &str) -> String {
    let folded = strip_diacritics(&raw.to_lowercase());
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn strip_diacritics(raw: &str) -> String {
    raw.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Seconds from either a plain number or an `H:MM:SS` / `MM:SS` clock value.
pub fn to_seconds(raw: &RawValue) -> Option<f64> {
    if let RawValue::Text(s) = raw {
        let s = s.trim();
        if s.contains(':') {
            let mut total = 0.0;
            for part in s.split(':') {
                let n = parse_number_es(part)?;
                total = total * 60.0 + n;
            }
            return Some(total);
        }
    }
    to_number_es(raw)
}
