//! Locale transforms applied to a working copy of each record

use crate::config::RenderConfig;
use crate::types::{FieldValue, Record};
use crate::utils::{group_thousands, zfill};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use tracing::warn;

/// English to Indonesian month names
const MONTH_NAMES: [(&str, &str); 12] = [
    ("January", "Januari"),
    ("February", "Februari"),
    ("March", "Maret"),
    ("April", "April"),
    ("May", "Mei"),
    ("June", "Juni"),
    ("July", "Juli"),
    ("August", "Agustus"),
    ("September", "September"),
    ("October", "Oktober"),
    ("November", "November"),
    ("December", "Desember"),
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Produce the render-ready copy of `record`
///
/// The input record is not modified. Fields named in `config` that are absent are
/// skipped; values that cannot be interpreted are kept as they are.
pub fn preprocess(record: &Record, config: &RenderConfig) -> Record {
    let mut working = record.clone();

    for field in &config.date_fields {
        if let Some(value) = record.get(field)
            && let Some(formatted) = format_date_value(field, value)
        {
            working.insert(field.as_str(), formatted);
        }
    }

    for field in &config.money_fields {
        if let Some(value) = record.get(field)
            && let Some(formatted) = format_money_value(field, value, &config.currency_symbol)
        {
            working.insert(field.as_str(), formatted);
        }
    }

    for field in &config.phone_fields {
        if let Some(value) = record.get(field)
            && !matches!(value, FieldValue::Empty)
        {
            working.insert(field.as_str(), zfill(&value.to_string(), config.phone_width));
        }
    }

    working
}

/// `DD MonthName YYYY` with the localized month name
///
/// ```
/// use chrono::NaiveDate;
/// use slm_batch::render::format_date;
///
/// let d = NaiveDate::from_ymd_opt(2024, 8, 7).unwrap();
/// assert_eq!(format_date(d), "07 Agustus 2024");
/// ```
pub fn format_date(date: NaiveDate) -> String {
    let english = date.format("%d %B %Y").to_string();
    MONTH_NAMES
        .iter()
        .find(|(en, _)| english.contains(en))
        .map(|(en, id)| english.replacen(en, id, 1))
        .unwrap_or(english)
}

/// Currency text rounded to whole units, `.` as the thousands separator
///
/// ```
/// use slm_batch::render::format_money;
///
/// assert_eq!(format_money(1234567.4, "Rp"), "Rp 1.234.567");
/// ```
pub fn format_money(amount: f64, symbol: &str) -> String {
    let rounded = amount.round_ties_even() as i64;
    format!("{symbol} {}", group_thousands(rounded, '.'))
}

/// Parse the date notations found in spreadsheet exports
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

fn format_date_value(field: &str, value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Date(d) => Some(format_date(*d)),
        FieldValue::Text(s) if s.trim().is_empty() => None,
        FieldValue::Text(s) => match parse_date(s) {
            Some(d) => Some(format_date(d)),
            None => {
                warn!(field, value = %s, "unrecognized date, leaving unchanged");
                None
            }
        },
        FieldValue::Number(_) => {
            warn!(field, value = %value, "numeric value in date field, leaving unchanged");
            None
        }
        FieldValue::Empty => None,
    }
}

fn format_money_value(field: &str, value: &FieldValue, symbol: &str) -> Option<String> {
    match value {
        FieldValue::Number(n) => Some(format_money(*n, symbol)),
        FieldValue::Text(s) if s.trim().is_empty() => None,
        FieldValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Some(format_money(n, symbol)),
            _ => {
                warn!(field, value = %s, "non-numeric amount, leaving unchanged");
                None
            }
        },
        FieldValue::Date(_) => {
            warn!(field, value = %value, "date value in money field, leaving unchanged");
            None
        }
        FieldValue::Empty => None,
    }
}
