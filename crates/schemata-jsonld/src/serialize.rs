//! Per-kind value normalization.
//!
//! Converts stored field values into JSON scalars according to the field's
//! storage kind. Values that cannot be represented in that kind yield
//! `None` and are left out of the document.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use schemata_core::{FieldKind, FieldValue};
use serde_json::{Number, Value};
use std::sync::LazyLock;

static MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").expect("markup pattern"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Normalize one scalar value for a field kind.
///
/// References are not scalars; they yield `None` here and are resolved by
/// the builder.
pub fn scalar(kind: FieldKind, value: &FieldValue) -> Option<Value> {
    match kind {
        FieldKind::EntityReference => None,
        FieldKind::DateTime => date_time(value).map(Value::String),
        FieldKind::Integer => integer(value),
        FieldKind::Decimal => decimal(value),
        FieldKind::Boolean => boolean(value).map(Value::Bool),
        FieldKind::PlainText => plain_text(value).map(Value::String),
        FieldKind::LongText => long_text(value).map(Value::String),
    }
}

fn date_time(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::DateTime(dt) => Some(utc(dt.with_timezone(&Utc))),
        FieldValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        FieldValue::Text(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                Some(utc(dt.with_timezone(&Utc)))
            } else if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Some(d.format("%Y-%m-%d").to_string())
            } else {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                    .ok()
                    .map(|naive| utc(naive.and_utc()))
            }
        }
        _ => None,
    }
}

fn utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn integer(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Integer(i) => Some(Value::from(*i)),
        FieldValue::Decimal(f) if f.fract() == 0.0 && f.is_finite() => {
            Some(Value::from(*f as i64))
        }
        FieldValue::Text(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn decimal(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Decimal(f) => Number::from_f64(*f).map(Value::Number),
        FieldValue::Integer(i) => Some(Value::from(*i)),
        FieldValue::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .map(Value::from)
                .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number))
        }
        _ => None,
    }
}

fn boolean(value: &FieldValue) -> Option<bool> {
    match value {
        FieldValue::Boolean(b) => Some(*b),
        FieldValue::Integer(0) => Some(false),
        FieldValue::Integer(1) => Some(true),
        FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn text_of(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Text(s) => Some(s.clone()),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Decimal(f) => Some(f.to_string()),
        FieldValue::Boolean(b) => Some(b.to_string()),
        FieldValue::Date(_) | FieldValue::DateTime(_) => date_time(value),
        FieldValue::Reference(_) => None,
    }
}

fn plain_text(value: &FieldValue) -> Option<String> {
    let text = text_of(value)?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Strip markup, decode common entities and collapse whitespace.
pub fn strip_markup(html: &str) -> String {
    let without_tags = MARKUP_RE.replace_all(html, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

fn long_text(value: &FieldValue) -> Option<String> {
    let text = strip_markup(&text_of(value)?);
    (!text.is_empty()).then_some(text)
}
